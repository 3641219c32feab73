use std::{
    fmt::Write as _,
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    thread,
};

use chrono::{DateTime, Local, NaiveDate};
use crossbeam_channel::{unbounded, Sender};
use log::Level;
use once_cell::sync::Lazy;

/// 寫檔前累積的最大位元組數
const FLUSH_THRESHOLD: usize = 2048;
const LOG_DIR: &str = "log";

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("tracker"));

/// A file logger that hands every line to a background writer thread.
///
/// Each logger owns one log file per day under `log/`, named
/// `<date>_<name>.log`. The date comes from each message's `created_at`, so a
/// long running process moves to a new file after midnight. Callers never
/// block on disk I/O; the writer drains the channel and flushes whenever the
/// channel runs empty or the pending buffer grows past [`FLUSH_THRESHOLD`].
pub struct Logger {
    writer: Option<Sender<LogMessage>>,
}

impl Logger {
    pub fn new(log_name: &str) -> Self {
        let writer = match fs::create_dir_all(LOG_DIR) {
            Ok(_) => Some(Self::spawn_writer(log_name.to_string())),
            Err(why) => {
                error_console(format!(
                    "Failed to create log directory for {} because {:?}",
                    log_name, why
                ));
                None
            }
        };

        Logger { writer }
    }

    pub fn info(&self, log: String) {
        self.send(Level::Info, log);
    }

    pub fn warn(&self, log: String) {
        self.send(Level::Warn, log);
    }

    pub fn error(&self, log: String) {
        self.send(Level::Error, log);
    }

    pub fn debug(&self, log: String) {
        self.send(Level::Debug, log);
    }

    fn send(&self, level: Level, msg: String) {
        self.send_message(LogMessage::new(level, msg));
    }

    fn send_message(&self, message: LogMessage) {
        match &self.writer {
            Some(writer) => {
                if let Err(why) = writer.send(message) {
                    error_console(why.to_string());
                }
            }
            None => match message.level {
                Level::Error | Level::Warn => error_console(message.msg),
                _ => info_console(message.msg),
            },
        }
    }

    fn spawn_writer(log_name: String) -> Sender<LogMessage> {
        let (tx, rx) = unbounded::<LogMessage>();

        // 寫入檔案的操作使用另一個線程處理
        thread::spawn(move || {
            let mut file = DailyFile::new(log_name);
            let mut line = String::with_capacity(FLUSH_THRESHOLD);

            for received in &rx {
                let date = received.created_at.date_naive();

                // 日期變更：先把前一天的內容寫完再換檔
                if file.date != Some(date) {
                    file.write(&mut line);
                    file.open(date);
                }

                if writeln!(
                    &mut line,
                    "{} {} {}",
                    received.created_at.format("%F %X%.6f"),
                    received.level,
                    received.msg
                )
                .is_err()
                {
                    continue;
                }

                if rx.is_empty() || line.len() >= FLUSH_THRESHOLD {
                    file.write(&mut line);
                }
            }

            file.write(&mut line);
        });

        tx
    }
}

/// 依日期開啟的日誌檔
struct DailyFile {
    name: String,
    date: Option<NaiveDate>,
    writer: Option<BufWriter<File>>,
}

impl DailyFile {
    fn new(name: String) -> Self {
        DailyFile {
            name,
            date: None,
            writer: None,
        }
    }

    fn open(&mut self, date: NaiveDate) {
        let log_path = log_path(&self.name, date);
        self.date = Some(date);
        self.writer = match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => Some(BufWriter::new(file)),
            Err(why) => {
                error_console(format!(
                    "Failed to open log file {} because {:?}",
                    log_path.display(),
                    why
                ));
                None
            }
        };
    }

    /// 寫出並清空暫存內容，檔案無法開啟時改印到 console
    fn write(&mut self, line: &mut String) {
        if line.is_empty() {
            return;
        }

        match self.writer.as_mut() {
            Some(writer) => {
                if let Err(why) = writer.write_all(line.as_bytes()) {
                    error_console(format!(
                        "Failed to write to log file. because:{:#?}\r\nmsg:{}",
                        why, line
                    ));
                }

                if let Err(why) = writer.flush() {
                    error_console(format!("Failed to flush log file. because:{:#?}", why));
                }
            }
            None => error_console(line.trim_end().to_string()),
        }

        line.clear();
    }
}

/// `log/<date>_<name>.log`
fn log_path(name: &str, date: NaiveDate) -> PathBuf {
    Path::new(LOG_DIR).join(format!("{}_{}.log", date.format("%Y-%m-%d"), name))
}

pub struct LogMessage {
    pub level: Level,
    pub msg: String,
    pub created_at: DateTime<Local>,
}

impl LogMessage {
    pub fn new(level: Level, msg: String) -> Self {
        LogMessage {
            level,
            msg,
            created_at: Local::now(),
        }
    }
}

pub fn info_file_async(log: String) {
    LOGGER.info(log);
}

pub fn warn_file_async(log: String) {
    LOGGER.warn(log);
}

pub fn error_file_async(log: String) {
    LOGGER.error(log);
}

pub fn debug_file_async(log: String) {
    LOGGER.debug(log);
}

pub fn info_console(log: String) {
    println!(
        "{} Info {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: String) {
    eprintln!(
        "{} Error {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_log_path_is_dated() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        assert_eq!(log_path("unit", date), Path::new("log").join("2024-03-15_unit.log"));
    }

    #[test]
    fn test_write_lines() {
        let logger = Logger::new("logging_test");
        logger.info("info line".to_string());
        logger.error("error line".to_string());

        // 等待背景線程寫檔
        thread::sleep(Duration::from_millis(300));

        let path = log_path("logging_test", Local::now().date_naive());
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("INFO info line"));
        assert!(content.contains("ERROR error line"));
    }

    #[test]
    fn test_switches_file_when_date_changes() {
        let name = format!("rotate_test_{}", std::process::id());
        let before = Local.with_ymd_and_hms(2024, 3, 15, 23, 59, 59).unwrap();
        let after = Local.with_ymd_and_hms(2024, 3, 16, 0, 0, 1).unwrap();
        let first = log_path(&name, before.date_naive());
        let second = log_path(&name, after.date_naive());
        fs::remove_file(&first).ok();
        fs::remove_file(&second).ok();

        let logger = Logger::new(&name);
        logger.send_message(LogMessage {
            level: Level::Info,
            msg: "before midnight".to_string(),
            created_at: before,
        });
        logger.send_message(LogMessage {
            level: Level::Info,
            msg: "after midnight".to_string(),
            created_at: after,
        });

        thread::sleep(Duration::from_millis(300));

        let first_content = fs::read_to_string(&first).unwrap();
        let second_content = fs::read_to_string(&second).unwrap();
        fs::remove_file(&first).ok();
        fs::remove_file(&second).ok();

        assert!(first_content.contains("INFO before midnight"));
        assert!(!first_content.contains("after midnight"));
        assert!(second_content.contains("INFO after midnight"));
        assert!(!second_content.contains("before midnight"));
    }
}
