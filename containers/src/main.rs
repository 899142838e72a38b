use clap::Parser;
use containers::args::{Action, ContainerArgs};
use containers::command::{fmriprep, qsiprep, recon_all, ContainerError};
use containers::settings::{Config, ConfigFile, ContainerSettings};

fn main(){
    let args = ContainerArgs::parse();

    match args.action {
        Action::NewSettingsTemplate(args) => {
            ContainerSettings::default().to_file(&args.output_config)
        }
        Action::Fmriprep(args) => {
            let settings = ContainerSettings::from_file(&args.settings);
            report(fmriprep(&settings,&args),"fmriprep",&args.subject)
        }
        Action::Qsiprep(args) => {
            let settings = ContainerSettings::from_file(&args.settings);
            report(qsiprep(&settings,&args),"qsiprep",&args.subject)
        }
        Action::ReconAll(args) => {
            let settings = ContainerSettings::from_file(&args.settings);
            report(recon_all(&settings,&args),"recon-all",&args.subject)
        }
    }
}

fn report(result:Result<(),ContainerError>,tool:&str,subject:&str) {
    match result {
        Ok(()) => {
            println!("{} complete for {}",tool,subject);
        }
        Err(e) => {
            eprintln!("ERROR: {} failed for {}: {:?}",tool,subject,e);
            std::process::exit(1);
        }
    }
}
