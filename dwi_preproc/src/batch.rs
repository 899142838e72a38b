/// per-subject accounting for serial batch runs. A subject failure is
/// reported and counted; it never stops the rest of the batch.
#[derive(Debug,Default)]
pub struct BatchSummary {
    pub n_success:usize,
    pub n_failed:usize,
    pub failed:Vec<String>,
}

impl BatchSummary {

    pub fn total(&self) -> usize {
        self.n_success + self.n_failed
    }

    pub fn report(&self) -> String {
        let mut lines = Vec::<String>::new();
        lines.push(format!("{} of {} units succeeded, {} failed",self.n_success,self.total(),self.n_failed));
        for name in &self.failed {
            lines.push(format!("  failed: {}",name));
        }
        lines.join("\n")
    }
}

pub fn run_batch<T,N,F>(items:&[T],name:N,mut run:F) -> BatchSummary
    where N:Fn(&T) -> String, F:FnMut(&T) -> Result<(),String>
{
    let mut summary = BatchSummary::default();
    for item in items {
        let label = name(item);
        println!("---- {} ----",label);
        match run(item) {
            Ok(()) => {
                summary.n_success += 1;
            }
            Err(e) => {
                eprintln!("ERROR: {} failed: {}",label,e);
                summary.n_failed += 1;
                summary.failed.push(label);
            }
        }
    }
    summary
}

#[test]
fn batch_continues_past_failures(){
    let items = vec!["a","b","c","d","e"];
    let mut visited = Vec::<String>::new();
    let summary = run_batch(&items,|i| i.to_string(),|i| {
        visited.push(i.to_string());
        match *i {
            "b" | "d" => Err(String::from("missing input")),
            _=> Ok(())
        }
    });
    // every unit ran even though two failed in the middle
    assert_eq!(visited,vec!["a","b","c","d","e"]);
    assert_eq!(summary.n_success,3);
    assert_eq!(summary.n_failed,2);
    assert_eq!(summary.failed,vec!["b","d"]);
}
