use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

/// subject identifier. Stored without the sub- prefix so it can be rendered
/// either way depending on what a tool wants to see. Serializes as the bare
/// label so config files stay flat.
#[derive(Clone,Debug,PartialEq,Eq,Hash,Serialize,Deserialize)]
#[serde(transparent)]
pub struct Subject {
    label:String,
}

impl Subject {
    pub fn new(label:&str) -> Self {
        let label = match label.strip_prefix("sub-") {
            Some(stripped) => stripped,
            None => label
        };
        Self {
            label:label.to_string()
        }
    }

    /// full BIDS id (sub-XXX)
    pub fn id(&self) -> String {
        format!("sub-{}",self.label)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

pub struct BidsLayout {
    root:PathBuf,
}

impl BidsLayout {

    pub fn new(root:&Path) -> Self {
        Self {
            root:root.to_owned()
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn subject_dir(&self,subject:&Subject) -> PathBuf {
        self.root.join(subject.id())
    }

    pub fn anat_dir(&self,subject:&Subject) -> PathBuf {
        self.subject_dir(subject).join("anat")
    }

    pub fn dwi_dir(&self,subject:&Subject) -> PathBuf {
        self.subject_dir(subject).join("dwi")
    }

    pub fn fmap_dir(&self,subject:&Subject) -> PathBuf {
        self.subject_dir(subject).join("fmap")
    }

    pub fn func_dir(&self,subject:&Subject) -> PathBuf {
        self.subject_dir(subject).join("func")
    }

    /// forward diffusion acquisition base name (no extension)
    pub fn dwi_base(&self,subject:&Subject,direction:&str) -> PathBuf {
        self.dwi_dir(subject).join(format!("{}_dir-{}_dwi",subject.id(),direction))
    }

    /// reverse-phase field map epi base name (no extension)
    pub fn fmap_epi_base(&self,subject:&Subject,direction:&str) -> PathBuf {
        self.fmap_dir(subject).join(format!("{}_acq-dwi_dir-{}_epi",subject.id(),direction))
    }

    pub fn derivatives_dir(&self,tool:&str) -> PathBuf {
        self.root.join("derivatives").join(tool)
    }

    pub fn derivative_subject_dir(&self,tool:&str,subject:&Subject) -> PathBuf {
        self.derivatives_dir(tool).join(subject.id())
    }

    /// scan the root for sub-* directories
    pub fn subjects(&self) -> Vec<Subject> {
        match utils::get_all_matches(&self.root,"sub-*") {
            Some(matches) => {
                matches.iter()
                    .filter(|p| p.is_dir())
                    .flat_map(|p| p.file_name().map(|n| Subject::new(n.to_str().unwrap())))
                    .collect()
            }
            None => Vec::new()
        }
    }
}

#[test]
fn subject_id_round_trip(){
    let s = Subject::new("EFI055ZRL");
    assert_eq!(s.id(),"sub-EFI055ZRL");
    let s = Subject::new("sub-EFI055ZRL");
    assert_eq!(s.id(),"sub-EFI055ZRL");
    assert_eq!(s.label(),"EFI055ZRL");
}

#[test]
fn layout_paths(){
    let l = BidsLayout::new(Path::new("/data/bids"));
    let s = Subject::new("01");
    assert_eq!(l.dwi_base(&s,"PA"),Path::new("/data/bids/sub-01/dwi/sub-01_dir-PA_dwi"));
    assert_eq!(l.fmap_epi_base(&s,"AP"),Path::new("/data/bids/sub-01/fmap/sub-01_acq-dwi_dir-AP_epi"));
    assert_eq!(l.derivative_subject_dir("dtifit",&s),Path::new("/data/bids/derivatives/dtifit/sub-01"));
}
