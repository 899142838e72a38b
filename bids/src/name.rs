use regex::Regex;

/// entity map parsed from a BIDS basename. Optional entities may appear in
/// any order between the subject label and the suffix.
#[derive(Clone,Debug,PartialEq,Default)]
pub struct BidsName {
    pub sub:String,
    pub ses:Option<String>,
    pub task:Option<String>,
    pub acq:Option<String>,
    pub dir:Option<String>,
    pub run:Option<String>,
    pub echo:Option<String>,
    pub suffix:String,
    pub extension:String,
}

const SUFFIXES:&str = r"(_T1w|_T2w|_dwi|_epi|_bold|_sbref|_magnitude|_phase)(\.[^\.]+(?:\.[^\.]+)?)$";

impl BidsName {

    pub fn parse(basename:&str) -> Option<Self> {
        let sub_re = Regex::new(r"^sub-([^_]+)").unwrap();
        let sub = sub_re.captures(basename)?.get(1)?.as_str().to_string();

        let suffix_re = Regex::new(SUFFIXES).unwrap();
        let caps = suffix_re.captures(basename)?;
        let suffix = caps.get(1)?.as_str().trim_start_matches('_').to_string();
        let extension = caps.get(2)?.as_str().to_string();

        let entity = |key:&str| -> Option<String> {
            let re = Regex::new(&format!(r"_{}-([^_\.]+)",key)).unwrap();
            re.captures(basename).map(|c| c.get(1).unwrap().as_str().to_string())
        };

        Some(Self {
            sub,
            ses:entity("ses"),
            task:entity("task"),
            acq:entity("acq"),
            dir:entity("dir"),
            run:entity("run"),
            echo:entity("echo"),
            suffix,
            extension,
        })
    }

    pub fn run_number(&self) -> Option<u32> {
        self.run.as_ref().and_then(|r| r.parse().ok())
    }
}

#[test]
fn parse_dwi_name(){
    let n = BidsName::parse("sub-EFI055ZRL_dir-PA_dwi.nii.gz").expect("should parse");
    assert_eq!(n.sub,"EFI055ZRL");
    assert_eq!(n.dir.as_deref(),Some("PA"));
    assert_eq!(n.suffix,"dwi");
    assert_eq!(n.extension,".nii.gz");
}

#[test]
fn parse_entities_any_order(){
    let n = BidsName::parse("sub-01_ses-02_run-2_task-rest_bold.nii").expect("should parse");
    assert_eq!(n.ses.as_deref(),Some("02"));
    assert_eq!(n.task.as_deref(),Some("rest"));
    assert_eq!(n.run_number(),Some(2));
    assert_eq!(n.extension,".nii");
}

#[test]
fn reject_non_bids_name(){
    assert!(BidsName::parse("t1_mprage_sag_p2_5.nii.gz").is_none());
    assert!(BidsName::parse("sub-01_unknown.xyz").is_none());
}
