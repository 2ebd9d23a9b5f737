use std::sync::Arc;

use clap::Parser;
use colored::*;

use abtest_pool::cli::{collect_params, Args, Command};
use abtest_pool::{
    decide, impl_pattern, logging, ExperimentController, ExperimentsConfig, Parameters,
    PatternStore, SqliteStore, TestKey,
};

// ---------------------------------------------------------------------------
// Demo experiment: four headline variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Headline {
    A,
    B,
    C,
    D,
}

impl_pattern!(Headline { A = 0, B = 1, C = 2, D = 3 });

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeadlineKey {
    Banner,
    Checkout,
}

impl TestKey for HeadlineKey {
    fn as_key(&self) -> &str {
        match self {
            HeadlineKey::Banner   => "Banner",
            HeadlineKey::Checkout => "Checkout",
        }
    }
}

/// Host-side experiment object: owns its controller.
struct HeadlineTest {
    controller: ExperimentController<HeadlineKey, Headline>,
}

impl HeadlineTest {
    const NAME: &'static str = "HeadlineTest";

    fn new(
        config: &ExperimentsConfig,
        timing: Option<abtest_pool::CheckTiming>,
        store: Arc<dyn PatternStore>,
    ) -> Result<Self, abtest_pool::AbTestError> {
        let mut settings = config.controller_config(Self::NAME);
        if let Some(t) = timing {
            settings.check_timing = t;
        }
        let controller = ExperimentController::new(settings, store, decide::uniform::<Headline>);
        controller.install()?;
        Ok(Self { controller })
    }

    fn register_demo_tests(&self) -> Result<(), abtest_pool::AbTestError> {
        self.controller.add_test(HeadlineKey::Banner, |pattern| {
            println!("  {} banner rendered with headline {:?}", "▶".bright_cyan(), pattern);
        })?;
        self.controller.add_test_with_parameters_only(
            HeadlineKey::Checkout,
            [Headline::C, Headline::D],
            |pattern, params: Option<&Parameters>| {
                let n = params.map(|p| p.len()).unwrap_or(0);
                println!(
                    "  {} checkout variant {:?} ({} parameter(s))",
                    "▶".bright_green(),
                    pattern,
                    n
                );
            },
        )
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init_tracing(&args.log);

    let config = match &args.config {
        Some(path) => ExperimentsConfig::load(path)?,
        None => ExperimentsConfig::default(),
    };
    let store: Arc<dyn PatternStore> = Arc::new(SqliteStore::open(&args.db)?);
    let test = HeadlineTest::new(&config, args.timing.map(Into::into), store)?;
    let settings = test.controller.config();

    match args.command {
        Command::Show => {
            let pattern = test.controller.pattern()?;
            println!(
                "{} {:?}  (save key {}, timing {}, persisted: {})",
                "pattern".bright_cyan().bold(),
                pattern,
                settings.save_key,
                settings.check_timing,
                test.controller.has_persisted_pattern()?
            );
        }
        Command::Reset => {
            let pattern = test.controller.reset_pattern()?;
            println!("{} {:?}", "new pattern".bright_yellow().bold(), pattern);
        }
        Command::Run { params } => {
            test.register_demo_tests()?;
            let params = collect_params(&params);
            println!(
                "{} {:?}",
                "executing with pattern".bright_cyan().bold(),
                test.controller.pattern()?
            );
            test.controller.execute(HeadlineKey::Banner)?;
            test.controller.execute_with(HeadlineKey::Checkout, &params)?;
            test.controller.uninstall()?;
        }
    }
    Ok(())
}
