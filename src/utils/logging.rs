use chrono::Local;
use env_logger::{Builder, Env, Target};
use log::{debug, error, info};
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the logging system.
///
/// Log lines go to stderr so that command output on stdout stays machine
/// readable. When `LOG_DIR` is set, lines are also appended to a
/// per-process file in that directory.
pub fn init_logger(default_level: &str) {
    INIT.call_once(|| {
        let env = Env::default().filter_or("LOG_LEVEL", default_level);
        let mut builder = Builder::from_env(env);
        builder.format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}: {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        });

        let log_dir = env::var("LOG_DIR").ok().map(PathBuf::from);
        let file = log_dir.as_deref().map(open_log_file);

        match file {
            Some(Ok((file, path))) => {
                builder
                    .target(Target::Pipe(Box::new(FileAndStderr { file })))
                    .init();
                info!("Logging initialized: {}", path.display());
            }
            Some(Err(e)) => {
                builder.target(Target::Stderr).init();
                error!("Failed to open log file, logging to stderr only: {}", e);
            }
            None => {
                builder.target(Target::Stderr).init();
            }
        }

        let level = env::var("LOG_LEVEL").unwrap_or_else(|_| default_level.to_string());
        debug!("Log level: {}", level);
    });
}

fn open_log_file(log_dir: &Path) -> std::io::Result<(File, PathBuf)> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(format!("keystroke_auth_{}.log", Local::now().format("%Y%m%d_%H%M%S")));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}

/// Writer that duplicates log output to a file and stderr
struct FileAndStderr {
    file: File,
}

impl Write for FileAndStderr {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()?;
        self.file.flush()
    }
}
