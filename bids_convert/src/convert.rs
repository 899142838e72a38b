use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use bids::layout::Subject;
use crate::rules::SeriesRules;

const IMAGE_EXTS:[&str;2] = ["nii.gz","nii"];
const SIDE_EXTS:[&str;3] = ["json","bval","bvec"];

#[derive(Clone,Debug,PartialEq)]
pub struct CopyPlan {
    pub src:PathBuf,
    pub dst:PathBuf,
}

/// trailing _N series number the scanner appends to every export
pub fn series_number(basename:&str) -> Option<u32> {
    let base = basename.split('.').next().unwrap_or(basename);
    base.rsplit('_').next().and_then(|last| last.parse().ok())
}

pub fn is_nii(basename:&str) -> bool {
    let n = basename.to_lowercase();
    n.ends_with(".nii") || n.ends_with(".nii.gz")
}

fn base_of(basename:&str) -> String {
    basename.split('.').next().unwrap_or(basename).to_string()
}

/// infer the subject label from the export directory name: from the marker
/// onward when one is given, underscores removed either way
pub fn subject_from_src_dir(src_dir:&Path,marker:Option<&str>) -> Subject {
    let name = src_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or(String::from(""));
    let cand = match marker {
        Some(marker) => {
            match name.find(marker) {
                Some(idx) => name[idx..].to_string(),
                None => name
            }
        }
        None => name
    };
    Subject::new(&cand.replace("_",""))
}

pub struct ConversionPlanner<'a> {
    src_dir:&'a Path,
    out_dir:&'a Path,
    subject:&'a Subject,
    rules:&'a SeriesRules,
    names:HashSet<String>,
}

impl<'a> ConversionPlanner<'a> {

    pub fn new(src_dir:&'a Path,out_dir:&'a Path,subject:&'a Subject,rules:&'a SeriesRules,basenames:&[String]) -> Self {
        Self {
            src_dir,
            out_dir,
            subject,
            rules,
            names:basenames.iter().cloned().collect(),
        }
    }

    /// every file of the series that actually exists: the image itself plus
    /// whichever sidecars came with it
    fn series_files(&self,base:&str) -> Vec<(String,String)> {
        let mut found = Vec::<(String,String)>::new();
        for ext in IMAGE_EXTS.iter().chain(SIDE_EXTS.iter()) {
            let name = format!("{}.{}",base,ext);
            if self.names.contains(&name) {
                found.push((ext.to_string(),name));
            }
        }
        found
    }

    fn push_series(&self,plans:&mut Vec<CopyPlan>,base:&str,modality:&str,dst_base:&str) {
        for (ext,name) in self.series_files(base) {
            plans.push(CopyPlan{
                src:self.src_dir.join(name),
                dst:self.out_dir.join(modality).join(format!("{}.{}",dst_base,ext)),
            });
        }
    }

    fn matches_all_tokens(name:&str,tokens:&[String]) -> bool {
        let lower = name.to_lowercase();
        tokens.iter().all(|t| lower.contains(&t.to_lowercase()))
    }

    fn candidates<F>(&self,filter:F) -> Vec<&String>
        where F:Fn(&str) -> bool
    {
        let mut c:Vec<&String> = self.names.iter().filter(|n| filter(n)).collect();
        c.sort();
        c
    }

    fn plan_anat(&self,plans:&mut Vec<CopyPlan>) {
        let t1 = self.candidates(|n| Self::matches_all_tokens(n,&self.rules.t1_tokens) && is_nii(n));
        // lowest series number wins as run-1
        if let Some(pick) = t1.iter().min_by_key(|n| series_number(n).unwrap_or(9999)) {
            self.push_series(plans,&base_of(pick),"anat",&format!("{}_run-1_T1w",self.subject.id()));
        }
        let t2 = self.candidates(|n| Self::matches_all_tokens(n,&self.rules.t2_tokens) && is_nii(n));
        if let Some(pick) = t2.iter().min_by_key(|n| series_number(n).unwrap_or(9999)) {
            self.push_series(plans,&base_of(pick),"anat",&format!("{}_T2w",self.subject.id()));
        }
    }

    fn plan_dwi(&self,plans:&mut Vec<CopyPlan>) {
        let dwi = self.candidates(|n| n.contains(&self.rules.dwi_token) && n.ends_with(".nii.gz"));

        // group by series number and note which ones carry a complete
        // gradient table
        let mut complete = HashMap::<u32,String>::new();
        for name in &dwi {
            if let Some(series) = series_number(name) {
                let base = base_of(name);
                let has_bval = self.names.contains(&format!("{}.bval",base));
                let has_bvec = self.names.contains(&format!("{}.bvec",base));
                if has_bval && has_bvec {
                    complete.insert(series,base);
                }
            }
        }

        let mut pick = None;
        for preferred in &self.rules.preferred_dwi_series {
            if complete.contains_key(preferred) {
                pick = Some(*preferred);
                break
            }
        }
        if pick.is_none() {
            pick = complete.keys().max().cloned();
        }

        if let Some(series) = pick {
            let base = complete.get(&series).unwrap();
            self.push_series(plans,base,"dwi",&format!("{}_dir-{}_dwi",self.subject.id(),self.rules.dwi_direction));
        }

        // the reverse-encoded b0 becomes the diffusion field map
        let rev = self.candidates(|n| n.contains(&self.rules.dwi_reverse_token) && n.ends_with(".nii.gz"));
        if let Some(pick) = rev.iter().max_by_key(|n| series_number(n).unwrap_or(0)) {
            self.push_series(plans,&base_of(pick),"fmap",
                &format!("{}_acq-dwi_dir-{}_epi",self.subject.id(),self.rules.dwi_reverse_direction));
        }
    }

    fn pick_fmap(&self,direction:&str,kind:&str) -> Option<String> {
        let token = format!("{}_{}_{}",self.rules.fmap_token,direction,kind);
        let cand = self.candidates(|n| n.contains(&token) && n.ends_with(".nii.gz"));
        cand.iter().max_by_key(|n| series_number(n).unwrap_or(0)).map(|n| base_of(n))
    }

    fn plan_bold_fmaps(&self,plans:&mut Vec<CopyPlan>) {
        for direction in ["AP","PA"] {
            if let Some(base) = self.pick_fmap(direction,&self.rules.fmap_rest_kind) {
                self.push_series(plans,&base,"fmap",
                    &format!("{}_dir-{}_acq-rest_epi",self.subject.id(),direction));
            }
            // first task kind that produced a series wins
            for kind in &self.rules.fmap_task_kinds {
                if let Some(base) = self.pick_fmap(direction,kind) {
                    self.push_series(plans,&base,"fmap",
                        &format!("{}_dir-{}_acq-task_epi",self.subject.id(),direction));
                    break
                }
            }
        }
    }

    fn plan_bold(&self,plans:&mut Vec<CopyPlan>) {
        // numbered resting runs
        for (run,token) in self.rules.rest_tokens.iter().enumerate() {
            let cand = self.candidates(|n| n.contains(token) && n.ends_with(".nii.gz"));
            if let Some(pick) = cand.iter().min_by_key(|n| series_number(n).unwrap_or(0)) {
                self.push_series(plans,&base_of(pick),"func",
                    &format!("{}_task-rest_run-{}_bold",self.subject.id(),run+1));
            }
        }

        // task runs numbered by series order, run entity only when repeated
        for rule in &self.rules.tasks {
            let mut cand = self.candidates(|n| n.contains(&rule.token) && n.ends_with(".nii.gz"));
            cand.sort_by_key(|n| series_number(n).unwrap_or(0));
            let multiple = cand.len() > 1;
            for (idx,name) in cand.iter().enumerate() {
                let run_suffix = match multiple {
                    true => format!("_run-{}",idx+1),
                    false => String::from("")
                };
                self.push_series(plans,&base_of(name),"func",
                    &format!("{}_task-{}{}_bold",self.subject.id(),rule.task,run_suffix));
            }
        }
    }

    pub fn plan(&self) -> Vec<CopyPlan> {
        let mut plans = Vec::<CopyPlan>::new();
        self.plan_anat(&mut plans);
        self.plan_dwi(&mut plans);
        self.plan_bold_fmaps(&mut plans);
        self.plan_bold(&mut plans);
        plans
    }
}

/// carry out (or just print) a conversion plan
pub fn execute(plans:&[CopyPlan],dry_run:bool) -> Result<usize,String> {
    let action = match dry_run {
        true => "PLAN",
        false => "COPY"
    };
    for plan in plans {
        println!("[{}] {:?} -> {:?}",action,plan.src,plan.dst);
        if !dry_run {
            if let Some(parent) = plan.dst.parent() {
                std::fs::create_dir_all(parent).map_err(|e| format!("cannot create {:?}: {}",parent,e))?;
            }
            std::fs::copy(&plan.src,&plan.dst).map_err(|e| format!("cannot copy {:?}: {}",plan.src,e))?;
        }
    }
    Ok(plans.len())
}

#[test]
fn series_numbers_parse_from_export_names(){
    assert_eq!(series_number("t1_mprage_sag_p2_5.nii.gz"),Some(5));
    assert_eq!(series_number("sms4_diff_CMR130_PA_8.nii.gz"),Some(8));
    assert_eq!(series_number("no_trailing_number.nii.gz"),None);
}

#[test]
fn subject_inference_from_directory(){
    let s = subject_from_src_dir(Path::new("/raw/THU_20240830_EFI_055_ZRL"),Some("EFI_"));
    assert_eq!(s.id(),"sub-EFI055ZRL");
    let s = subject_from_src_dir(Path::new("/raw/PILOT_01"),None);
    assert_eq!(s.id(),"sub-PILOT01");
}
