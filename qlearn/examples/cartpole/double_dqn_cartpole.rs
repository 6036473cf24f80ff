use anyhow::Result;
use clap::Parser;
use qlearn::{
    cartpole::{train, watch, CartPoleArgs, DqnCartPoleConfig},
    qlearn_candle_agent::dqn::DqnKind,
    qlearn_core::EpsilonSchedule,
};

const MODEL_DIR: &str = "./qlearn/examples/cartpole/model/double_dqn_cartpole";

/// The target network is copied every 32 optimization steps, exploration decays by
/// epoch.
fn preset() -> DqnCartPoleConfig {
    DqnCartPoleConfig {
        kind: DqnKind::Double,
        eps_collect: EpsilonSchedule::Exponential {
            start: 1.0,
            decay: 0.9,
            min: 0.05,
        },
        target_update_freq: 32,
        tau: 1.0,
        alpha: 0.6,
        beta: 0.4,
        ..Default::default()
    }
}

/// Train double DQN agent in cartpole environment
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
    fn test_double_dqn_cartpole() -> Result<()> {
        let tmp_dir = TempDir::new("double_dqn_cartpole")?;
        let storage = StorageConfig::new(tmp_dir.path(), tmp_dir.path().join("log"));
        let config = DqnCartPoleConfig {
            warmup_size: 64,
            epochs: 2,
            step_per_epoch: 50,
            test_episodes: 2,
            tau: 0.1,
            target_update_freq: 1,
            ..preset()
        };

        let mut recorder = BufferedRecorder::new();
        let result = train(&config, &storage, None, &mut recorder)?;
        assert_eq!(result.epochs, 2);
        assert!(storage
            .checkpoint_dir("best")
            .join("qnet_tgt.safetensors")
            .exists());

        watch(&config, &storage.checkpoint_dir("best"))?;
        Ok(())
    }
}
