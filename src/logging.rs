use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::filter::threshold::ThresholdFilter;

use crate::config::LogConfig;

const PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S%.3f%:z)} {h({l:<5})} {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const ROLL_COUNT: u32 = 5;
const QUIET_TARGETS: [&str; 3] = ["hyper", "reqwest", "rustls"];

pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    log4rs::init_config(build(config)?)?;
    Ok(())
}

fn build(config: &LogConfig) -> anyhow::Result<log4rs::Config> {
    let level = config.level();
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let mut builder = log4rs::Config::builder().appender(
        Appender::builder()
            .filter(Box::new(ThresholdFilter::new(level)))
            .build("console", Box::new(console)),
    );
    let mut root = Root::builder().appender("console");

    if let Some(path) = config.file() {
        let archive = format!("{}.{{}}", path.display());
        let roller = FixedWindowRoller::builder().build(&archive, ROLL_COUNT)?;
        let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
        let file = RollingFileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build(path, Box::new(policy))?;
        builder = builder.appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(level)))
                .build("file", Box::new(file)),
        );
        root = root.appender("file");
    }

    for target in QUIET_TARGETS {
        builder = builder.logger(Logger::builder().build(target, LevelFilter::Warn.min(level)));
    }

    Ok(builder.build(root.build(level))?)
}
