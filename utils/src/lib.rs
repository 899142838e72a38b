use std::path::{Path, PathBuf};
use std::fs::File;
use std::io::{Write, Read};
use glob::glob;
use walkdir::WalkDir;
use path_clean::PathClean;

pub fn read_to_string(filepath:&Path,extension:&str) -> String {
    let p = filepath.with_extension(extension);
    let mut f = File::open(&p).expect(&format!("cannot open file {:?}",p));
    let mut s = String::new();
    f.read_to_string(&mut s).expect("trouble reading file");
    s
}

pub fn write_to_file(filepath:&Path,extension:&str,string:&str){
    let p = filepath.with_extension(extension);
    let mut f = File::create(p).expect("failed to create file");
    f.write_all(string.as_bytes()).expect("trouble writing to file");
}

pub fn vec_to_string<T>(vec:&Vec<T>) -> String
    where T:std::string::ToString {
    let vstr:Vec<String> = vec.iter().map(|num| num.to_string()).collect();
    return vstr.join(" ");
}

pub fn trim_newline(s: &mut String) {
    if s.ends_with('\n') {
        s.pop();
        if s.ends_with('\r') {
            s.pop();
        }
    }
}

/// read a text file as a list of entries, one per line, skipping blank lines
pub fn read_list_file(filepath:&Path) -> Vec<String> {
    let mut f = File::open(filepath).expect(&format!("cannot open file {:?}",filepath));
    let mut s = String::new();
    f.read_to_string(&mut s).expect("trouble reading file");
    s.lines().map(|line| line.trim()).filter(|line| !line.is_empty()).map(|line| line.to_string()).collect()
}

pub fn get_first_match(dir:&Path,pattern:&str) -> Option<PathBuf>  {
    let pat = dir.join(pattern);
    let pat = pat.to_str().expect("cannot coerce to str");
    let matches:Vec<PathBuf> = glob(pat).expect("Failed to read glob pattern").flat_map(|m| m).collect();
    match matches.is_empty() {
        true => None,
        false => Some(matches[0].clone())
    }
}


// single depth search
pub fn get_all_matches(dir:&Path,pattern:&str) -> Option<Vec<PathBuf>> {
    let pat = dir.join(pattern);
    let pat = pat.to_str().expect("cannot coerce to str");
    let mut matches:Vec<PathBuf> = glob(pat).expect("Failed to read glob pattern").flat_map(|m| m).collect();
    matches.sort();
    match matches.is_empty() {
        true => None,
        false => Some(matches)
    }
}


// recursive walk
pub fn find_files(base_dir:&Path,extension:&str) -> Option<Vec<PathBuf>>  {
    let mut files = Vec::<PathBuf>::new();
    for entry in WalkDir::new(base_dir).into_iter().filter_map(|e| e.ok()) {
        match entry.path().extension() {
            Some(ext) => {
                match ext.to_str().unwrap() == extension {
                    true => {
                        files.push(entry.path().to_owned());
                    }
                    false => {}
                }
            }
            None => {}
        }
    }
    match files.len(){
        0 => None,
        _=> Some(files)
    }
}

/// resolve a path against the working directory and clean up any ./.. segments.
/// container runtimes want clean absolute paths for bind mounts.
pub fn absolute_path(path:&Path) -> PathBuf {
    match path.is_absolute() {
        true => path.to_path_buf().clean(),
        false => std::env::current_dir().expect("cannot determine working directory").join(path).clean()
    }
}

#[test]
fn list_file_skips_blanks(){
    let dir = std::env::temp_dir().join("utils_list_test");
    std::fs::create_dir_all(&dir).expect("cannot create test dir");
    let f = dir.join("subjects.txt");
    write_to_file(&f,"txt","sub-01\n\nsub-02\n   \nsub-03\n");
    let items = read_list_file(&f.with_extension("txt"));
    assert_eq!(items,vec!["sub-01","sub-02","sub-03"]);
}
