use anyhow::Result;
use candle_core::{Device, Tensor};
use qlearn::{
    cartpole::ReplayBuffer,
    qlearn_candle_agent::TensorBatch,
    qlearn_core::{
        replay_buffer::{GenericTransitionBatch, PerConfig, SimpleReplayBufferConfig},
        ExperienceBufferBase, ReplayBufferBase, TransitionBatch,
    },
};

/// The `id`-th transition of a sequence, observations and reward carry `id`.
fn transition(id: usize) -> Result<GenericTransitionBatch<TensorBatch, TensorBatch>> {
    let obs = |v: f32| Tensor::new(&[[v, 0.0, 0.0, 0.0]], &Device::Cpu);
    Ok(GenericTransitionBatch {
        obs: TensorBatch::from_tensor(obs(id as f32)?),
        act: TensorBatch::from_tensor(Tensor::new(&[[id as i64]], &Device::Cpu)?),
        next_obs: TensorBatch::from_tensor(obs(id as f32 + 1.0)?),
        reward: vec![id as f32],
        is_terminated: vec![0],
        is_truncated: vec![0],
        weight: None,
        ix_sample: None,
    })
}

fn buffer(per_config: Option<PerConfig>) -> Result<ReplayBuffer> {
    let config = SimpleReplayBufferConfig::default()
        .capacity(10)
        .seed(0)
        .per_config(per_config);
    ReplayBuffer::build(&config)
}

#[test]
fn test_newest_transitions_are_kept() -> Result<()> {
    let mut buffer = buffer(None)?;
    for id in 0..15 {
        buffer.push(transition(id)?)?;
    }
    assert_eq!(buffer.len(), 10);

    let acts: Tensor = buffer.whole_actions()?.try_into()?;
    let mut ids = acts.flatten_all()?.to_vec1::<i64>()?;
    ids.sort();
    assert_eq!(ids, (5..15).collect::<Vec<_>>());

    let batch = buffer.batch(4)?;
    assert_eq!(batch.len(), 4);
    let (obs, act, next_obs, reward, is_terminated, _, ixs, weight) = batch.unpack();
    assert!(weight.is_none());
    assert_eq!(ixs.map(|ixs| ixs.len()), Some(4));
    assert_eq!(is_terminated, vec![0; 4]);

    let obs: Tensor = obs.try_into()?;
    let next_obs: Tensor = next_obs.try_into()?;
    let act: Tensor = act.try_into()?;
    assert_eq!(obs.dims(), &[4, 4]);
    let obs = obs.narrow(1, 0, 1)?.flatten_all()?.to_vec1::<f32>()?;
    let next_obs = next_obs.narrow(1, 0, 1)?.flatten_all()?.to_vec1::<f32>()?;
    let act = act.flatten_all()?.to_vec1::<i64>()?;
    for i in 0..4 {
        assert!((5..15).contains(&act[i]));
        assert_eq!(obs[i], act[i] as f32);
        assert_eq!(next_obs[i], act[i] as f32 + 1.0);
        assert_eq!(reward[i], act[i] as f32);
    }
    Ok(())
}

#[test]
fn test_prioritized_batch_weights() -> Result<()> {
    let mut buffer = buffer(Some(PerConfig::default().alpha(1.0).beta_0(0.4)))?;
    for id in 0..15 {
        buffer.push(transition(id)?)?;
    }

    let batch = buffer.batch(4)?;
    let ixs = batch.ix_sample.clone();
    let td_err = Some(vec![0.0, 1.0, 2.0, 3.0]);
    buffer.update_priority(&ixs, &td_err)?;

    for _ in 0..20 {
        let weight = buffer.batch(4)?.weight.unwrap_or_default();
        assert_eq!(weight.len(), 4);
        let max = weight.iter().cloned().fold(f32::MIN, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
        assert!(weight.iter().all(|&w| w > 0.0 && w <= 1.0));
    }
    Ok(())
}
