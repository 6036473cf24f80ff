use anyhow::Result;
use clap::Parser;
use qlearn::{
    cartpole::{train, watch, CartPoleArgs, DqnCartPoleConfig},
    qlearn_candle_agent::dqn::DqnKind,
    qlearn_core::EpsilonSchedule,
};

const MODEL_DIR: &str = "./qlearn/examples/cartpole/model/raw_dqn_cartpole";

/// Each collected transition is learned once, right after it is collected.
///
/// The buffer holds the latest transition only and there is no warmup beyond it.
fn preset() -> DqnCartPoleConfig {
    DqnCartPoleConfig {
        kind: DqnKind::Raw,
        eps_collect: EpsilonSchedule::Exponential {
            start: 0.9,
            decay: 0.99,
            min: 0.01,
        },
        lr: 1e-4,
        gamma: 0.98,
        alpha: 0.0,
        buffer_size: 1,
        batch_size: 1,
        warmup_size: 1,
        collect_per_step: 1,
        update_per_step: 1,
        ..Default::default()
    }
}

/// Train DQN agent without experience replay in cartpole environment
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
        cartpole::{train, DqnCartPoleConfig},
        qlearn_core::{record::BufferedRecorder, StorageConfig},
    };
    use tempdir::TempDir;

    #[test]
    fn test_raw_dqn_cartpole() -> Result<()> {
        let tmp_dir = TempDir::new("raw_dqn_cartpole")?;
        let storage = StorageConfig::new(tmp_dir.path(), tmp_dir.path().join("log"));
        let config = DqnCartPoleConfig {
            epochs: 2,
            step_per_epoch: 30,
            test_episodes: 1,
            ..preset()
        };

        let mut recorder = BufferedRecorder::new();
        let result = train(&config, &storage, None, &mut recorder)?;
        assert_eq!(result.env_steps, 61);
        assert_eq!(result.opt_steps, 60);
        assert!(!storage
            .checkpoint_dir("best")
            .join("qnet_tgt.safetensors")
            .exists());
        Ok(())
    }
}
