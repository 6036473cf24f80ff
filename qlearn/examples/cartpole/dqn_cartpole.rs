use anyhow::Result;
use clap::Parser;
use qlearn::{
    cartpole::{train, watch, CartPoleArgs, DqnCartPoleConfig},
    qlearn_candle_agent::dqn::DqnKind,
    qlearn_core::EpsilonSchedule,
};

const MODEL_DIR: &str = "./qlearn/examples/cartpole/model/dqn_cartpole";

/// Exploration decays linearly over the first million environment steps.
fn preset() -> DqnCartPoleConfig {
    DqnCartPoleConfig {
        kind: DqnKind::Vanilla,
        eps_collect: EpsilonSchedule::Linear {
            start: 1.0,
            end: 0.05,
            steps: 1_000_000,
        },
        alpha: 0.6,
        beta: 0.4,
        ..Default::default()
    }
}

/// Train DQN agent with experience replay in cartpole environment
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(flatten)]
    cartpole: CartPoleArgs,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.cartpole.config(preset())?;
    let storage = args.cartpole.storage(MODEL_DIR);

    if args.cartpole.watch {
        watch(&config, &args.cartpole.ckpt(&storage))?;
    } else {
        let mut recorder = args.cartpole.recorder();
        let ckpt = args.cartpole.ckpt.as_deref();
        let result = train(&config, &storage, ckpt, recorder.as_mut())?;
        if result.epochs > 0 {
            watch(&config, &storage.checkpoint_dir("best"))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::preset;
    use anyhow::Result;
    use qlearn::{
        cartpole::{train, watch, DqnCartPoleConfig},
        qlearn_core::{record::BufferedRecorder, StorageConfig},
    };
    use tempdir::TempDir;

    #[test]
    fn test_dqn_cartpole() -> Result<()> {
        let tmp_dir = TempDir::new("dqn_cartpole")?;
        let storage = StorageConfig::new(tmp_dir.path(), tmp_dir.path().join("log"));
        let config = DqnCartPoleConfig {
            warmup_size: 64,
            epochs: 2,
            step_per_epoch: 50,
            test_episodes: 2,
            ..preset()
        };

        let mut recorder = BufferedRecorder::new();
        let result = train(&config, &storage, None, &mut recorder)?;
        assert_eq!(result.epochs, 2);
        assert_eq!(result.opt_steps, 100);

        watch(&config, &storage.checkpoint_dir("best"))?;
        Ok(())
    }
}
