use std::io::Write;

/// 初始化全局 logger
///
/// 默认级别为 info，可以通过 `RUST_LOG` 覆盖
pub fn init_log() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let level_style = match record.level() {
                log::Level::Error => anstyle::Style::new().fg_color(Some(anstyle::AnsiColor::Red.into())).bold(),
                log::Level::Warn => anstyle::Style::new().fg_color(Some(anstyle::AnsiColor::Yellow.into())),
                log::Level::Info => anstyle::Style::new().fg_color(Some(anstyle::AnsiColor::Green.into())),
                _ => buf.default_level_style(record.level()),
            };
            let grey_style =
                anstyle::Style::new().fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(110, 110, 110))));

            let file = record.file().unwrap_or("").rsplit(['/', '\\']).next().unwrap_or("");
            let line = record.line().unwrap_or(0);
            let time = chrono::Local::now().format("%H:%M:%S%.3f");
            let module = record.module_path().unwrap_or("");

            writeln!(
                buf,
                "{level_style}[{time} {:<5}] {}{level_style:#}\n\t {grey_style}{module} ({file}:{line}){grey_style:#}",
                record.level(),
                record.args()
            )
        })
        .init();
}

/// 将 panic 信息也输出到日志中
pub fn panic_handler(info: &std::panic::PanicHookInfo) {
    log::error!("{}", info);
}
