use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::definition::loader::load_from_file;
use crate::definition::validate;

pub struct ValidateCommand {
    pub files: Vec<PathBuf>,
}

impl ValidateCommand {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    pub async fn execute(&self) -> Result<()> {
        let mut failed = 0;

        for path in &self.files {
            match load_from_file(path).await {
                Ok(definition) => {
                    let issues = validate(&definition);
                    if issues.is_empty() {
                        println!(
                            "✅ {} ({}: {} states, flow {})",
                            path.display(),
                            definition.kanban_id,
                            definition.states.len(),
                            definition.flow_sequence.join(" → ")
                        );
                        let finals = definition.final_states();
                        if finals.is_empty() {
                            println!("   ⚠️  no final state declared");
                        } else {
                            println!("   final: {}", finals.join(", "));
                        }
                    } else {
                        failed += 1;
                        println!("❌ {} has {} problem(s):", path.display(), issues.len());
                        for issue in issues {
                            println!("   • {issue}");
                        }
                    }
                }
                Err(e) => {
                    failed += 1;
                    println!("❌ {}: {e}", path.display());
                }
            }
        }

        if failed > 0 {
            bail!("{failed} definition file(s) failed validation");
        }
        Ok(())
    }
}
