use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::confounds::{after_first, mean_ignoring_missing};

/// head-motion cutoffs. Defaults follow the values the site has always
/// screened with.
#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct MotionThresholds {
    pub mean_fd:f64,
    pub frame_fd:f64,
    pub frame_count:usize,
    pub max_fd:f64,
}

impl MotionThresholds {
    pub fn default() -> Self {
        Self {
            mean_fd: 0.2,
            frame_fd: 0.2,
            frame_count: 20,
            max_fd: 3.0,
        }
    }
}

#[derive(Clone,Debug,PartialEq)]
pub struct MotionSummary {
    pub mean_fd:Option<f64>,
    pub outlier_framecount:usize,
    pub if_meanfd_outlier:bool,
    pub if_fdframe_outlier:bool,
    pub if_maxfd_outlier:bool,
    pub good_data:bool,
}

/// classify one motion trace. The caller hands in the full column; the
/// first sample is excluded here.
pub fn classify(values:&[Option<f64>],thresholds:&MotionThresholds) -> Option<MotionSummary> {
    let series = after_first(values);
    let mean_fd = mean_ignoring_missing(series)?;

    let outlier_framecount = series.iter().flatten().filter(|v| **v >= thresholds.frame_fd).count();
    let max_count = series.iter().flatten().filter(|v| **v >= thresholds.max_fd).count();

    let if_meanfd_outlier = mean_fd >= thresholds.mean_fd;
    let if_fdframe_outlier = outlier_framecount >= thresholds.frame_count;
    let if_maxfd_outlier = max_count != 0;

    Some(MotionSummary {
        mean_fd: Some(mean_fd),
        outlier_framecount,
        if_meanfd_outlier,
        if_fdframe_outlier,
        if_maxfd_outlier,
        good_data: !(if_meanfd_outlier || if_fdframe_outlier || if_maxfd_outlier),
    })
}

pub struct MotionRow {
    pub subject_name:String,
    pub summary:Option<MotionSummary>,
}

/// per-subject rows plus the trailing SUM row. The SUM row counts flagged
/// subjects rather than averaging anything.
pub struct MotionReport {
    thresholds:MotionThresholds,
    rows:Vec<MotionRow>,
}

fn fmt_opt_f64(v:&Option<f64>) -> String {
    match v {
        Some(v) => format!("{}",v),
        None => String::from("")
    }
}

impl MotionReport {

    pub fn new(thresholds:&MotionThresholds) -> Self {
        Self {
            thresholds:thresholds.clone(),
            rows:Vec::new(),
        }
    }

    pub fn push(&mut self,subject_name:&str,summary:Option<MotionSummary>) {
        self.rows.push(MotionRow{
            subject_name:subject_name.to_string(),
            summary,
        });
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_good(&self) -> usize {
        self.rows.iter().flat_map(|r| &r.summary).filter(|s| s.good_data).count()
    }

    pub fn to_csv(&self) -> String {
        let mut lines = Vec::<String>::new();
        lines.push(String::from("subject_name,mean_fd,good_data,if_meanfd_outlier,if_fdframe_outlier,if_maxfd_outlier,outlier_framecount,threshold_mean_fd,threshold_frame_fd,threshold_frame_count"));
        for row in &self.rows {
            match &row.summary {
                Some(s) => {
                    lines.push(format!("{},{},{},{},{},{},{},{},{},{}",
                        row.subject_name,
                        fmt_opt_f64(&s.mean_fd),
                        s.good_data,
                        s.if_meanfd_outlier,
                        s.if_fdframe_outlier,
                        s.if_maxfd_outlier,
                        s.outlier_framecount,
                        self.thresholds.mean_fd,
                        self.thresholds.frame_fd,
                        self.thresholds.frame_count));
                }
                None => {
                    lines.push(format!("{},,,,,,,{},{},{}",
                        row.subject_name,
                        self.thresholds.mean_fd,
                        self.thresholds.frame_fd,
                        self.thresholds.frame_count));
                }
            }
        }
        // SUM row carries counts of flagged subjects
        let n_mean = self.rows.iter().flat_map(|r| &r.summary).filter(|s| s.if_meanfd_outlier).count();
        let n_frame = self.rows.iter().flat_map(|r| &r.summary).filter(|s| s.if_fdframe_outlier).count();
        let n_max = self.rows.iter().flat_map(|r| &r.summary).filter(|s| s.if_maxfd_outlier).count();
        lines.push(format!("SUM,,{},{},{},{},,{},{},{}",
            self.n_good(),
            n_mean,
            n_frame,
            n_max,
            self.thresholds.mean_fd,
            self.thresholds.frame_fd,
            self.thresholds.frame_count));
        let mut s = lines.join("\n");
        s.push('\n');
        s
    }

    pub fn write_csv(&self,path:&Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect(&format!("cannot create {:?}",parent));
        }
        std::fs::write(path,self.to_csv()).expect(&format!("cannot write {:?}",path));
        println!("wrote {:?}",path);
    }
}

/// the simpler diffusion report: subject and mean fd only, SUM row kept for
/// consistency with the motion reports
pub struct MeanFdReport {
    rows:Vec<(String,Option<f64>)>,
}

impl MeanFdReport {

    pub fn new() -> Self {
        Self { rows:Vec::new() }
    }

    pub fn push(&mut self,subject_name:&str,mean_fd:Option<f64>) {
        self.rows.push((subject_name.to_string(),mean_fd));
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn to_csv(&self) -> String {
        let mut lines = Vec::<String>::new();
        lines.push(String::from("subject_name,mean_fd"));
        for (name,mean) in &self.rows {
            lines.push(format!("{},{}",name,fmt_opt_f64(mean)));
        }
        lines.push(String::from("SUM,"));
        let mut s = lines.join("\n");
        s.push('\n');
        s
    }

    pub fn write_csv(&self,path:&Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect(&format!("cannot create {:?}",parent));
        }
        std::fs::write(path,self.to_csv()).expect(&format!("cannot write {:?}",path));
        println!("wrote {:?}",path);
    }
}

#[test]
fn classification_matches_screening_rule(){
    // first sample is undefined and excluded
    let values = vec![None,Some(0.1),Some(0.3),Some(0.05)];
    let mut thresholds = MotionThresholds::default();
    thresholds.frame_count = 1;
    let s = classify(&values,&thresholds).expect("trace has data");
    assert!((s.mean_fd.unwrap() - 0.15).abs() < 1.0E-12);
    assert_eq!(s.outlier_framecount,1);
    assert!(!s.if_meanfd_outlier);
    assert!(s.if_fdframe_outlier);
    assert!(!s.if_maxfd_outlier);
    // one frame at or over the frame threshold with frame_count=1 spoils the data
    assert!(!s.good_data);

    // with the default frame allowance the same trace passes
    let s = classify(&values,&MotionThresholds::default()).expect("trace has data");
    assert!(s.good_data);
}

#[test]
fn empty_trace_has_no_summary(){
    let values = vec![None,None];
    assert!(classify(&values,&MotionThresholds::default()).is_none());
}

#[test]
fn sum_row_counts_flags(){
    let mut thresholds = MotionThresholds::default();
    thresholds.frame_count = 1;
    let mut report = MotionReport::new(&thresholds);
    report.push("sub-01",classify(&[None,Some(0.05),Some(0.06)],&thresholds));
    report.push("sub-02",classify(&[None,Some(0.1),Some(0.3),Some(0.05)],&thresholds));
    report.push("sub-03",None);
    let csv = report.to_csv();
    let lines:Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(),5); // header + 3 subjects + SUM
    assert!(lines[1].starts_with("sub-01,"));
    assert!(lines[4].starts_with("SUM,,1,0,1,0,"));
}
