use crate::{CartPoleAct, CartPoleConfig, CartPoleObs};
use anyhow::{ensure, Result};
use log::trace;
use qlearn_core::{record::Record, Env, Step};
use rand::{rngs::StdRng, Rng, SeedableRng};

const GRAVITY: f64 = 9.8;
const MASS_CART: f64 = 1.0;
const MASS_POLE: f64 = 0.1;
const TOTAL_MASS: f64 = MASS_CART + MASS_POLE;
/// Half the pole's length.
const LENGTH: f64 = 0.5;
const POLE_MASS_LENGTH: f64 = MASS_POLE * LENGTH;
const FORCE_MAG: f64 = 10.0;
/// Seconds between state updates.
const TAU: f64 = 0.02;
const THETA_THRESHOLD: f64 = 12.0 * 2.0 * std::f64::consts::PI / 360.0;
const X_THRESHOLD: f64 = 2.4;

/// Cart-pole environment.
///
/// The state is integrated with the explicit Euler method. The reward is 1 for every
/// step, including the one terminating the episode. The episode terminates when the
/// pole leans more than 12 degrees or the cart leaves `[-2.4, 2.4]`, and is truncated
/// after [`CartPoleConfig::max_steps`] steps.
pub struct CartPole {
    state: [f64; 4],
    rng: StdRng,
    seed: i64,
    max_steps: Option<usize>,
    t: usize,
}

impl CartPole {
    fn obs(&self) -> CartPoleObs {
        CartPoleObs(self.state.map(|x| x as f32))
    }

    fn reset_state(&mut self) -> CartPoleObs {
        let rng = &mut self.rng;
        self.state = [(); 4].map(|_| rng.gen_range(-0.05..0.05));
        self.t = 0;
        self.obs()
    }

    fn is_terminated(&self) -> bool {
        let [x, _, theta, _] = self.state;
        !(-X_THRESHOLD..=X_THRESHOLD).contains(&x)
            || !(-THETA_THRESHOLD..=THETA_THRESHOLD).contains(&theta)
    }

    /// Returns the current state.
    pub fn state(&self) -> [f64; 4] {
        self.state
    }

    /// Sets the state, used to start an episode from a given configuration.
    pub fn set_state(&mut self, state: [f64; 4]) {
        self.state = state;
    }
}

impl Env for CartPole {
    type Config = CartPoleConfig;
    type Obs = CartPoleObs;
    type Act = CartPoleAct;
    type Info = ();

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        Ok(Self {
            state: [0.0; 4],
            rng: StdRng::seed_from_u64(seed as u64),
            seed,
            max_steps: config.max_steps,
            t: 0,
        })
    }

    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        ensure!(a.0 == 0 || a.0 == 1, "Invalid action {} for cart-pole", a.0);

        let [x, x_dot, theta, theta_dot] = self.state;
        let force = if a.0 == 1 { FORCE_MAG } else { -FORCE_MAG };
        let (sin, cos) = theta.sin_cos();

        let temp = (force + POLE_MASS_LENGTH * theta_dot.powi(2) * sin) / TOTAL_MASS;
        let theta_acc = (GRAVITY * sin - cos * temp)
            / (LENGTH * (4.0 / 3.0 - MASS_POLE * cos.powi(2) / TOTAL_MASS));
        let x_acc = temp - POLE_MASS_LENGTH * theta_acc * cos / TOTAL_MASS;

        self.state = [
            x + TAU * x_dot,
            x_dot + TAU * x_acc,
            theta + TAU * theta_dot,
            theta_dot + TAU * theta_acc,
        ];
        self.t += 1;

        let is_terminated = self.is_terminated();
        let is_truncated = !is_terminated && matches!(self.max_steps, Some(m) if self.t >= m);
        if is_terminated || is_truncated {
            trace!("Episode ended at step {}, state = {:?}", self.t, self.state);
        }

        let step = Step::new(
            self.obs(),
            a.clone(),
            vec![1.0],
            vec![is_terminated as i8],
            vec![is_truncated as i8],
            (),
            None,
        );
        Ok((step, Record::empty()))
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        Ok(self.reset_state())
    }

    /// Reseeds the random number generator with `seed + ix` and resets the environment.
    fn reset_with_index(&mut self, ix: usize) -> Result<Self::Obs> {
        self.rng = StdRng::seed_from_u64(self.seed.wrapping_add(ix as i64) as u64);
        Ok(self.reset_state())
    }
}
