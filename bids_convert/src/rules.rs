use std::path::Path;
use serde::{Deserialize, Serialize};
use toml;

/// one task-fMRI mapping: the scanner series token and the BIDS task name it
/// converts to
#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct TaskRule {
    pub task:String,
    pub token:String,
}

/// scanner series classification rules. The defaults match the protocol the
/// site has been exporting; other protocols re-map the tokens in a rules
/// file instead of editing code.
#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct SeriesRules {
    /// substrings that must all appear in a T1w series name
    pub t1_tokens:Vec<String>,
    /// substrings that must all appear in a T2w series name
    pub t2_tokens:Vec<String>,
    /// token of the main diffusion series (forward phase encoding)
    pub dwi_token:String,
    /// direction label the diffusion series converts to
    pub dwi_direction:String,
    /// token of the reverse-encoded b0 used as the diffusion field map
    pub dwi_reverse_token:String,
    /// direction label of the reverse-encoded b0
    pub dwi_reverse_direction:String,
    /// diffusion series numbers preferred over the highest complete one
    pub preferred_dwi_series:Vec<u32>,
    /// leading token of the spin-echo field map series. Direction and kind
    /// get appended with underscores (e.g. ep2d_se_2mm_AP_REST)
    pub fmap_token:String,
    /// field map kind used for the resting acquisitions
    pub fmap_rest_kind:String,
    /// field map kinds tried in order for the task acquisitions
    pub fmap_task_kinds:Vec<String>,
    /// tokens of the first and second resting bold series
    pub rest_tokens:Vec<String>,
    /// task bold series mappings
    pub tasks:Vec<TaskRule>,
}

impl Config for SeriesRules {
    fn default() -> Self {
        let task = |task:&str| TaskRule {
            task:task.to_string(),
            token:format!("sms4_bold_{}",task),
        };
        Self {
            t1_tokens: vec![String::from("t1"),String::from("mprage")],
            t2_tokens: vec![String::from("t2"),String::from("spc")],
            dwi_token: String::from("sms4_diff_CMR130_PA"),
            dwi_direction: String::from("PA"),
            dwi_reverse_token: String::from("sms4_diff_CMR130_B0_AP"),
            dwi_reverse_direction: String::from("AP"),
            preferred_dwi_series: vec![8,6],
            fmap_token: String::from("ep2d_se_2mm"),
            fmap_rest_kind: String::from("REST"),
            fmap_task_kinds: vec![String::from("TASK1"),String::from("TASK2")],
            rest_tokens: vec![String::from("sms4_bold_rest1"),String::from("sms4_bold_rest2")],
            tasks: vec![
                task("fm"),
                task("math"),
                task("natural"),
                task("nback"),
                task("read"),
                task("sst"),
                task("switch"),
            ],
        }
    }
}

impl ConfigFile for SeriesRules {

    fn to_file(&self, filename: &Path) {
        let t = toml::to_string_pretty(&self).unwrap();
        utils::write_to_file(filename,&Self::file_ext(),&t);
    }

    fn from_file(filename: &Path) -> Self {
        let t = utils::read_to_string(filename,&Self::file_ext());
        toml::from_str(&t).expect("conversion rules file is corrupt")
    }

    fn file_ext() -> String {
        String::from("conversion_rules")
    }

}

pub trait Config {
    fn default() -> Self;
}

pub trait ConfigFile {
    fn to_file(&self, filename:&Path);
    fn from_file(filename:&Path) -> Self;
    fn file_ext() -> String;
}

#[test]
fn rules_round_trip(){
    let dir = std::env::temp_dir().join("series_rules_tests");
    std::fs::create_dir_all(&dir).expect("cannot create test dir");
    let f = dir.join("site");
    SeriesRules::default().to_file(&f);
    let r = SeriesRules::from_file(&f);
    assert_eq!(r.preferred_dwi_series,vec![8,6]);
    assert_eq!(r.tasks.len(),7);
    assert_eq!(r.tasks[3].task,"nback");
}
