use std::path::PathBuf;

#[derive(clap::Parser,Debug)]
pub struct ContainerArgs {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(clap::Subcommand,Debug)]
pub enum Action {
    /// run fmriprep for one subject
    Fmriprep(PrepRunArgs),
    /// run qsiprep for one subject
    Qsiprep(PrepRunArgs),
    /// run freesurfer recon-all for one subject
    ReconAll(ReconAllArgs),
    /// create a new container settings template to modify for this site
    NewSettingsTemplate(TemplateArgs),
}

#[derive(Clone,clap::Args,Debug)]
pub struct PrepRunArgs {
    /// container settings for this site (images, license, binds)
    pub settings:PathBuf,
    /// root of the BIDS tree
    pub bids_root:PathBuf,
    /// output directory for the derivative tree
    pub output_dir:PathBuf,
    /// subject to process
    pub subject:String,
    /// scratch directory handed to the suite
    #[clap(long)]
    pub work_dir:Option<PathBuf>,
    /// threads the suite may use
    #[clap(long)]
    pub nthreads:Option<u32>,
    /// memory limit in megabytes
    #[clap(long)]
    pub mem_mb:Option<u32>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct ReconAllArgs {
    /// container settings for this site (images, license, binds)
    pub settings:PathBuf,
    /// freesurfer subjects directory
    pub subjects_dir:PathBuf,
    /// subject id to create
    pub subject:String,
    /// T1-weighted input volume
    pub t1:PathBuf,
}

#[derive(Clone,clap::Args,Debug)]
pub struct TemplateArgs {
    /// absolute path to the new settings file, or just a file name to save to the working directory.
    /// your file extension will not be respected.
    pub output_config:PathBuf,
}
