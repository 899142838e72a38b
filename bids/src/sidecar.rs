use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

/// the slice of sidecar metadata the pipelines actually consume. Unknown
/// fields in the json are ignored.
#[derive(Clone,Debug,Default,Serialize,Deserialize)]
pub struct Sidecar {
    #[serde(rename="PhaseEncodingDirection")]
    pub phase_encoding_direction:Option<String>,
    #[serde(rename="TotalReadoutTime")]
    pub total_readout_time:Option<f32>,
    #[serde(rename="EffectiveEchoSpacing")]
    pub effective_echo_spacing:Option<f32>,
    #[serde(rename="ReconMatrixPE")]
    pub recon_matrix_pe:Option<u32>,
    #[serde(rename="IntendedFor")]
    pub intended_for:Option<serde_json::Value>,
}

#[derive(Clone,Debug,PartialEq)]
pub enum SidecarError {
    NotFound(PathBuf),
    Malformed(PathBuf),
    MissingPhaseEncoding,
    UnknownPhaseEncoding(String),
    MissingReadoutInfo,
}

impl Sidecar {

    pub fn from_file(path:&Path) -> Result<Self,SidecarError> {
        let mut f = File::open(path).map_err(|_| SidecarError::NotFound(path.to_owned()))?;
        let mut s = String::new();
        f.read_to_string(&mut s).map_err(|_| SidecarError::Malformed(path.to_owned()))?;
        serde_json::from_str(&s).map_err(|_| SidecarError::Malformed(path.to_owned()))
    }

    /// total readout time in seconds. When the scanner export doesn't carry
    /// the field directly, fall back to EffectiveEchoSpacing * (ReconMatrixPE - 1)
    pub fn total_readout_time(&self) -> Result<f32,SidecarError> {
        match self.total_readout_time {
            Some(t) => Ok(t),
            None => {
                match (self.effective_echo_spacing,self.recon_matrix_pe) {
                    (Some(spacing),Some(matrix_pe)) => Ok(spacing*(matrix_pe.saturating_sub(1)) as f32),
                    _=> Err(SidecarError::MissingReadoutInfo)
                }
            }
        }
    }

    pub fn phase_encoding(&self) -> Result<PhaseEncoding,SidecarError> {
        match &self.phase_encoding_direction {
            Some(code) => PhaseEncoding::from_code(code),
            None => Err(SidecarError::MissingPhaseEncoding)
        }
    }
}

/// phase encoding axis and polarity as encoded in the sidecar
/// (i/j/k with an optional trailing minus)
#[derive(Clone,Copy,Debug,PartialEq,Serialize,Deserialize)]
pub enum PhaseEncoding {
    I,
    IRev,
    J,
    JRev,
    K,
    KRev,
}

impl PhaseEncoding {

    pub fn from_code(code:&str) -> Result<Self,SidecarError> {
        match code.trim() {
            "i" => Ok(PhaseEncoding::I),
            "i-" => Ok(PhaseEncoding::IRev),
            "j" => Ok(PhaseEncoding::J),
            "j-" => Ok(PhaseEncoding::JRev),
            "k" => Ok(PhaseEncoding::K),
            "k-" => Ok(PhaseEncoding::KRev),
            other => Err(SidecarError::UnknownPhaseEncoding(other.to_string()))
        }
    }

    /// unit vector for a topup acqparams row
    pub fn acq_params_vector(&self) -> [i32;3] {
        match self {
            PhaseEncoding::I => [1,0,0],
            PhaseEncoding::IRev => [-1,0,0],
            PhaseEncoding::J => [0,1,0],
            PhaseEncoding::JRev => [0,-1,0],
            PhaseEncoding::K => [0,0,1],
            PhaseEncoding::KRev => [0,0,-1],
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            PhaseEncoding::I => PhaseEncoding::IRev,
            PhaseEncoding::IRev => PhaseEncoding::I,
            PhaseEncoding::J => PhaseEncoding::JRev,
            PhaseEncoding::JRev => PhaseEncoding::J,
            PhaseEncoding::K => PhaseEncoding::KRev,
            PhaseEncoding::KRev => PhaseEncoding::K,
        }
    }
}

#[test]
fn readout_time_fallback(){
    let s = Sidecar {
        effective_echo_spacing:Some(0.00058),
        recon_matrix_pe:Some(140),
        ..Sidecar::default()
    };
    let t = s.total_readout_time().expect("fallback should resolve");
    assert!((t - 0.00058*139.0).abs() < 1.0E-7);
}

#[test]
fn readout_time_direct_field_wins(){
    let s = Sidecar {
        total_readout_time:Some(0.05),
        effective_echo_spacing:Some(0.00058),
        recon_matrix_pe:Some(140),
        ..Sidecar::default()
    };
    assert_eq!(s.total_readout_time(),Ok(0.05));
}

#[test]
fn readout_time_missing_is_fatal(){
    let s = Sidecar::default();
    assert_eq!(s.total_readout_time(),Err(SidecarError::MissingReadoutInfo));
}

#[test]
fn phase_encoding_codes(){
    assert_eq!(PhaseEncoding::from_code("j-"),Ok(PhaseEncoding::JRev));
    assert_eq!(PhaseEncoding::JRev.acq_params_vector(),[0,-1,0]);
    assert_eq!(PhaseEncoding::JRev.reversed(),PhaseEncoding::J);
    assert!(PhaseEncoding::from_code("q").is_err());
}
