use std::process::Command;
use std::path::{Path, PathBuf};

#[derive(Clone,Debug)]
pub enum SlurmError {
    SbatchNotFound,
    SubmissionRejected(String),
    NoJobId(String),
}

#[derive(PartialEq,Eq,Debug,Clone)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Unknown,
}

impl JobState {
    fn parse(token:&str) -> Option<JobState> {
        match token.trim() {
            "pending" => Some(JobState::Pending),
            "running" => Some(JobState::Running),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            "cancelled" => Some(JobState::Cancelled),
            _=> None
        }
    }
}

/// one sbatch submission for a unit of pipeline work. The job is named
/// after the run number and the subject it processes so squeue output reads
/// like the work list.
pub struct JobRequest {
    run_number:String,
    unit:String,
    pub partition:String,
    pub memory:String,
    pub output:Option<PathBuf>,
    pub email:Option<String>,
    pub start_delay_sec:Option<u32>,
    commands:Vec<String>,
}

impl JobRequest {

    pub fn new(run_number:&str,unit:&str,commands:&[Command]) -> JobRequest {
        JobRequest {
            run_number:run_number.to_string(),
            unit:unit.to_string(),
            partition:String::from(""),
            memory:String::from("16G"),
            output:None,
            email:None,
            start_delay_sec:None,
            commands:commands.iter().map(|cmd| format!("{:?}",cmd)).collect(),
        }
    }

    pub fn job_name(&self) -> String {
        format!("{}_{}",self.run_number,self.unit)
    }

    fn directives(&self) -> Vec<String> {
        let mut d = Vec::<String>::new();
        d.push(format!("#SBATCH --job-name={}",self.job_name()));
        d.push("#SBATCH --no-requeue".to_string());
        d.push(format!("#SBATCH --mem={}",self.memory));
        if !self.partition.is_empty() {
            d.push(format!("#SBATCH --partition={}",self.partition));
        }
        match &self.output {
            Some(out) => d.push(format!("#SBATCH --output={}",out.to_str().unwrap())),
            None => {}
        }
        match self.start_delay_sec {
            Some(delay) => d.push(format!("#SBATCH --begin=now+{}",delay)),
            None => {}
        }
        match &self.email {
            Some(address) => {
                d.push(format!("#SBATCH --mail-user={}",address));
                d.push("#SBATCH --mail-type=END,FAIL".to_string());
            }
            None => {}
        }
        d
    }

    pub fn render(&self) -> String {
        let mut script = String::from("#!/usr/bin/env bash\n");
        script.push_str(&self.directives().join("\n"));
        script.push_str("\nhostname\n");
        for command in &self.commands {
            script.push_str(command);
            script.push('\n');
        }
        script
    }

    pub fn write_script(&self,dir:&Path) -> PathBuf {
        let script = dir.join(self.job_name());
        utils::write_to_file(&script,"bash",&self.render());
        script.with_extension("bash")
    }

    /// write the batch script into the work directory and hand it to sbatch.
    /// Returns the job id the scheduler assigned.
    pub fn submit(&self,write_location:&Path) -> Result<u32,SlurmError> {
        let script = self.write_script(write_location);
        let mut cmd = Command::new("sbatch");
        cmd.arg(&script);
        let o = cmd.output().map_err(|_| SlurmError::SbatchNotFound)?;
        if !o.status.success() {
            return Err(SlurmError::SubmissionRejected(String::from_utf8_lossy(&o.stderr).to_string()))
        }
        job_id_from_response(&String::from_utf8_lossy(&o.stdout))
    }
}

/// sbatch answers with "Submitted batch job <id>"
fn job_id_from_response(response:&str) -> Result<u32,SlurmError> {
    response.split_whitespace()
        .filter_map(|token| token.parse::<u32>().ok())
        .last()
        .ok_or(SlurmError::NoJobId(response.to_string()))
}

pub fn query_state(job_id:u32,n_tries:u16) -> JobState {
    for attempt in 0..=n_tries {
        let o = match Command::new("sacct")
            .arg("-j").arg(job_id.to_string())
            .arg("--format").arg("state")
            .output() {
            Ok(o) => o,
            Err(_) => {
                println!("sacct not found");
                return JobState::Unknown
            }
        };
        let text = String::from_utf8_lossy(&o.stdout).to_ascii_lowercase();
        match text.lines().last().and_then(|line| JobState::parse(line)) {
            Some(state) => return state,
            // accounting can lag a fresh submission
            None => {
                if attempt < n_tries {
                    std::thread::sleep(std::time::Duration::from_millis(1000));
                }
            }
        }
    }
    println!("gave up waiting for job state for job id: {}",job_id);
    JobState::Unknown
}

pub fn cancel(job_id:u32) -> bool {
    let mut cmd = Command::new("scancel");
    cmd.arg(job_id.to_string());
    match cmd.output(){
        Ok(o) => o.status.success(),
        Err(_) => {
            println!("scancel not found");
            false
        }
    }
}

#[test]
fn job_script_carries_directives(){
    let mut cmd = Command::new("dwi_preproc");
    cmd.arg("subject-manager").arg("launch").arg("/scratch/R0001.work/sub-01/R0001_sub-01");
    let mut job = JobRequest::new("R0001","sub-01",&[cmd]);
    job.partition = String::from("preprocessing");
    job.email = Some(String::from("operator@site.edu"));
    job.output = Some(PathBuf::from("/scratch/R0001.work/sub-01/slurm_out/slurm-%j.out"));
    let script = job.render();
    assert!(script.starts_with("#!/usr/bin/env bash"));
    assert!(script.contains("#SBATCH --job-name=R0001_sub-01"));
    assert!(script.contains("#SBATCH --partition=preprocessing"));
    assert!(script.contains("#SBATCH --mail-user=operator@site.edu"));
    assert!(script.contains("#SBATCH --mem=16G"));
    assert!(script.contains("hostname\n"));
}

#[test]
fn job_id_parsed_from_sbatch_response(){
    assert_eq!(job_id_from_response("Submitted batch job 6091\n").unwrap(),6091);
    assert!(matches!(job_id_from_response("sbatch: error"),Err(SlurmError::NoJobId(_))));
}

#[test]
fn sacct_states_map_to_job_states(){
    assert_eq!(JobState::parse("completed "),Some(JobState::Completed));
    assert_eq!(JobState::parse("----------"),None);
}
