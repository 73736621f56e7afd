use std::io::Write;

/// 以 Info 级别初始化日志，`RUST_LOG` 可以覆盖
pub fn init_log() {
    init_log_with_level(log::LevelFilter::Info);
}

/// 初始化 env_logger
///
/// 格式：`[时间] 级别 [文件:行号] 内容`，不同级别使用不同颜色。
/// 重复调用不会 panic（测试中多个用例都可能调用）。
pub fn init_log_with_level(level: log::LevelFilter) {
    let _ = env_logger::Builder::new()
        .format(|buf, record| {
            let info_style = buf
                .default_level_style(log::Level::Info)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green)));
            let warn_style = buf
                .default_level_style(log::Level::Warn)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)));
            let error_style = buf
                .default_level_style(log::Level::Error)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red)));
            let debug_style = buf
                .default_level_style(log::Level::Debug)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Cyan)));

            let level_style = match record.level() {
                log::Level::Info => info_style,
                log::Level::Warn => warn_style,
                log::Level::Error => error_style,
                log::Level::Debug => debug_style,
                _ => buf.default_level_style(record.level()),
            };
            let grey_style = info_style.fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(110, 110, 110))));

            let line = record.line().unwrap_or(!0);
            let file = record.file().unwrap_or("").rsplit(['\\', '/']).next().unwrap_or("");
            let time = chrono::Local::now().format("%H:%M:%S%.3f");
            let level = record.level();

            writeln!(
                buf,
                "{level_style}[{time}] {level:<5}{level_style:#} {grey_style}[{file}:{line}]{grey_style:#} {}",
                record.args()
            )
        })
        .filter(None, level)
        .parse_env("RUST_LOG")
        .try_init();
}

/// 将配置里的字符串转为日志级别，无法识别时使用 Info
pub fn parse_level(level: &str) -> log::LevelFilter {
    level.parse().unwrap_or_else(|_| {
        eprintln!("unknown log level \"{level}\", falling back to info");
        log::LevelFilter::Info
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("warn"), log::LevelFilter::Warn);
        assert_eq!(parse_level("DEBUG"), log::LevelFilter::Debug);
        assert_eq!(parse_level("nonsense"), log::LevelFilter::Info);
    }

    #[test]
    fn test_init_twice() {
        init_log();
        init_log_with_level(log::LevelFilter::Debug);
        log::info!("logger survives a second init");
    }
}
