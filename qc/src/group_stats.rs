use std::path::Path;
use crate::table::{parse_float, Table, TableError};

/// pass/fail accounting for one group and one modality. A subject enters
/// the total only when its FD value is present; pass means the FD sits at or
/// under the modality's threshold.
#[derive(Clone,Debug,PartialEq)]
pub struct GroupModalityStat {
    pub group:String,
    pub modality:String,
    pub pass:usize,
    pub fail:usize,
    pub total:usize,
}

pub struct GroupStatsSettings {
    /// column holding the group membership string
    pub group_column:String,
    /// labels matched case-insensitively as substrings of the group column
    pub labels:Vec<String>,
    /// group assigned to rows with an empty or NA membership string
    pub control_label:String,
    pub fd_threshold:f64,
    /// diffusion FD sits on a different scale and gets its own cutoff
    pub dwi_fd_threshold:f64,
}

impl GroupStatsSettings {
    pub fn default() -> Self {
        Self {
            group_column: String::from("group"),
            labels: Vec::new(),
            control_label: String::from("TD"),
            fd_threshold: 0.2,
            dwi_fd_threshold: 1.43,
        }
    }
}

/// the *_fd columns define the modalities under review
pub fn modalities(table:&Table) -> Vec<String> {
    table.header.iter()
        .filter(|h| h.ends_with("_fd"))
        .map(|h| h.trim_end_matches("_fd").to_string())
        .collect()
}

fn in_group(membership:&str,label:&str,control_label:&str) -> bool {
    let m = membership.trim().to_uppercase();
    match label == control_label {
        true => m.is_empty() || m == "NA" || m == "N/A",
        false => m.contains(&label.to_uppercase())
    }
}

fn summarize(table:&Table,settings:&GroupStatsSettings,group:&str,mask:&[bool],modality:&str) -> GroupModalityStat {
    let threshold = match modality == "dwi" {
        true => settings.dwi_fd_threshold,
        false => settings.fd_threshold
    };
    let fd_column = format!("{}_fd",modality);
    let mut pass = 0;
    let mut total = 0;
    for (row,selected) in table.rows.iter().zip(mask) {
        if !selected {
            continue
        }
        let fd = table.get(row,&fd_column).and_then(|v| parse_float(&v));
        if let Some(fd) = fd {
            total += 1;
            if fd <= threshold {
                pass += 1;
            }
        }
    }
    GroupModalityStat {
        group:group.to_string(),
        modality:modality.to_string(),
        pass,
        fail:total-pass,
        total,
    }
}

pub fn group_stats(table:&Table,settings:&GroupStatsSettings) -> Result<Vec<GroupModalityStat>,TableError> {
    let group_idx = table.column_index(&settings.group_column)?;
    let mods = modalities(table);

    let mut groups:Vec<String> = settings.labels.clone();
    if !groups.contains(&settings.control_label) {
        groups.push(settings.control_label.clone());
    }

    let mut stats = Vec::<GroupModalityStat>::new();
    for group in &groups {
        let mask:Vec<bool> = table.rows.iter()
            .map(|row| in_group(&row[group_idx],group,&settings.control_label))
            .collect();
        for modality in &mods {
            stats.push(summarize(table,settings,group,&mask,modality));
        }
    }

    // every subject, regardless of membership
    let all_mask:Vec<bool> = table.rows.iter().map(|_| true).collect();
    for modality in &mods {
        stats.push(summarize(table,settings,"ALL",&all_mask,modality));
    }

    Ok(stats)
}

pub fn write_stats(stats:&[GroupModalityStat],output:&Path) {
    let mut table = Table::new(&["group","modality","pass","fail","total"]);
    for s in stats {
        table.rows.push(vec![
            s.group.clone(),
            s.modality.clone(),
            s.pass.to_string(),
            s.fail.to_string(),
            s.total.to_string(),
        ]);
    }
    table.write_csv(output);
}

pub fn print_stats(stats:&[GroupModalityStat]) {
    let mut current = String::new();
    for s in stats {
        if s.modality != current {
            println!("\n[{}]",s.modality);
            current = s.modality.clone();
        }
        println!("{}: pass {} | fail {} | total {}",s.group,s.pass,s.fail,s.total);
    }
}

#[test]
fn groups_and_modalities_are_counted(){
    let mut t = Table::new(&["subj_ID","group","rest1_fd","dwi_fd"]);
    let mut push = |id:&str,group:&str,rest:&str,dwi:&str| {
        t.rows.push(vec![id.to_string(),group.to_string(),rest.to_string(),dwi.to_string()]);
    };
    push("sub-01","ADHD","0.1","0.5");
    push("sub-02","ADHD","0.4","2.0");
    push("sub-03","","0.15","");
    push("sub-04","NA","0.25","1.0");

    let mut settings = GroupStatsSettings::default();
    settings.labels = vec![String::from("ADHD")];

    let stats = group_stats(&t,&settings).expect("stats should compute");

    let find = |group:&str,modality:&str| -> &GroupModalityStat {
        stats.iter().find(|s| s.group == group && s.modality == modality).expect("stat row exists")
    };

    // rest threshold 0.2: sub-01 passes, sub-02 fails
    assert_eq!(find("ADHD","rest1"),&GroupModalityStat{group:String::from("ADHD"),modality:String::from("rest1"),pass:1,fail:1,total:2});
    // dwi threshold 1.43: 0.5 passes, 2.0 fails
    assert_eq!(find("ADHD","dwi").pass,1);
    assert_eq!(find("ADHD","dwi").fail,1);
    // empty and NA rows land in the control group
    assert_eq!(find("TD","rest1").total,2);
    assert_eq!(find("TD","rest1").pass,1);
    // missing dwi value for sub-03 keeps it out of the dwi total
    assert_eq!(find("TD","dwi").total,1);
    assert_eq!(find("ALL","rest1").total,4);
}
