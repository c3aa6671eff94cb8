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
use anyhow::Result;
use anyhow::bail;
use std::env;
use std::path::Path;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILE_VAR: &str = "LABBERIZE_LOG_FILE";

/// Sets up the global tracing subscriber.
///
/// If `LABBERIZE_LOG_FILE` names a file, logs are appended there without
/// ANSI colors; otherwise they go to stderr. The level comes from
/// `RUST_LOG` and defaults to `info`.
///
/// The returned guard flushes the file writer and must be held until exit.
pub fn setup_tracing() -> Result<Option<WorkerGuard>> {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let registry = tracing_subscriber::registry().with(env_filter);

  match env::var(LOG_FILE_VAR) {
    Ok(log_file) if !log_file.trim().is_empty() => {
      let (writer, guard) = file_writer(Path::new(log_file.trim()))?;
      registry
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()?;
      Ok(Some(guard))
    }
    _ => {
      registry
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()?;
      Ok(None)
    }
  }
}

/// Non-blocking writer for `path`, relative to the working directory
/// unless absolute.
fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
  let Some(file_name) = path.file_name() else {
    bail!("{LOG_FILE_VAR} must name a file, got '{}'", path.display());
  };
  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  let appender = tracing_appender::rolling::never(dir, file_name);
  Ok(tracing_appender::non_blocking(appender))
}
