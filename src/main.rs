// Copyright 2025 Chisomo Makombo Sakala
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use Commands::Expand;
use Commands::Generate;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use labberize::cli::Cli;
use labberize::cli::Commands;
use labberize::config::Config;
use labberize::export::generate_and_export;
use labberize::generator::IndexSpec;
use labberize::generator::QuantGenerator;
use labberize::logging::setup_tracing;
use labberize::node::NodeProvider;
use labberize::node::NodeTree;

#[tokio::main]
async fn main() -> Result<()> {
  let _log_guard = setup_tracing()?;

  let Cli { command } = Cli::parse();
  let main_span = tracing::info_span!("labberize");
  let _enter = main_span.enter();

  match command {
    Generate(args) => {
      tracing::info!(device = %args.device, "Generating driver...");

      let config = Config::try_from(args)?;
      let report = generate_and_export(&config).await?;

      tracing::info!(
        driver = %report.driver_path.display(),
        settings_written = report.settings_written,
        "Generation Complete."
      );
    }
    Expand {
      nodes,
      pattern,
      indexes,
    } => {
      let json = tokio::fs::read_to_string(&nodes)
        .await
        .with_context(|| format!("Failed to read {}", nodes.display()))?;
      let tree = NodeTree::from_json_str(&json)?;
      let paths: Vec<String> = tree.nodes()?.into_iter().map(|n| n.path).collect();

      let spec: IndexSpec = indexes.into_iter().collect();
      for path in QuantGenerator::new(&paths).expand(&pattern, &spec) {
        println!("{path}");
      }
    }
  }

  Ok(())
}
