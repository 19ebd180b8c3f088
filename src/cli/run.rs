use anyhow::{Context, Result};
use console::style;
use infersim::{
    HttpTokenSource, Mode, ScriptedSource, SimTiming, Simulator, Stage, TokenSource,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

const DEMO_CHUNKS: [&str; 8] = [
    "Language ", "models ", "predict ", "one ", "token ", "at ", "a ", "time.",
];

pub async fn cmd_run(
    prompt: &str,
    manual: bool,
    fast: bool,
    endpoint: Option<&str>,
    model: &str,
    chunks: Option<&str>,
) -> Result<()> {
    let source: Arc<dyn TokenSource> = match endpoint {
        Some(url) => {
            let mut http = HttpTokenSource::new(url, model);
            if let Ok(key) = std::env::var("INFERSIM_API_KEY") {
                http = http.with_api_key(key);
            }
            Arc::new(http)
        }
        None => {
            let script: Vec<String> = match chunks {
                Some(list) => list
                    .split(',')
                    .map(|c| format!("{} ", c.trim()))
                    .collect(),
                None => DEMO_CHUNKS.iter().map(|c| c.to_string()).collect(),
            };
            Arc::new(
                ScriptedSource::new(script).with_chunk_delay(Duration::from_millis(150)),
            )
        }
    };

    let timing = if fast {
        SimTiming::uniform(Duration::from_millis(150))
    } else {
        SimTiming::default()
    };
    let sim = Arc::new(Simulator::new(source).with_timing(timing));

    if manual {
        sim.controls().set_mode(Mode::Manual);
        println!(
            "{}",
            style("Manual mode: press Enter to advance through the pipeline.").dim()
        );
    }

    let mut stages = sim.subscribe_stage();
    let printer = tokio::spawn(async move {
        while stages.changed().await.is_ok() {
            let stage = *stages.borrow_and_update();
            let meta = stage.metadata();
            println!(
                "{} {}",
                style(format!("[{}]", meta.title)).cyan().bold(),
                meta.description
            );
            if stage == Stage::Finished {
                break;
            }
        }
    });

    let stepper = manual.then(|| {
        let sim = Arc::clone(&sim);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(_)) = lines.next_line().await {
                sim.advance_manual_step();
            }
        })
    });

    let run = sim.start(prompt);
    run.await.context("simulation task panicked")?;

    // Let the printer flush the final transition.
    tokio::time::sleep(Duration::from_millis(50)).await;
    printer.abort();
    if let Some(stepper) = stepper {
        stepper.abort();
    }

    let snapshot = sim.snapshot();
    if let Some(failure) = &snapshot.failure {
        println!("{} {}", style("Run failed:").red().bold(), failure);
        std::process::exit(1);
    }

    println!();
    println!(
        "{} {}",
        style("Tokens:").bold(),
        snapshot
            .tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" | ")
    );
    println!("{}", style("Output").green().bold());
    println!("{}", snapshot.output.trim_end());
    Ok(())
}
