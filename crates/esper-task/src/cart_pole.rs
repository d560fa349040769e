use esper_core::Network;

use crate::Task;

const GRAVITY: f64 = 9.8;
const CART_MASS: f64 = 1.0;
const POLE_MASS: f64 = 0.1;
const TOTAL_MASS: f64 = CART_MASS + POLE_MASS;
const POLE_HALF_LENGTH: f64 = 0.5;
const POLE_MASS_LENGTH: f64 = POLE_MASS * POLE_HALF_LENGTH;
const FORCE_MAG: f64 = 10.0;
const TAU: f64 = 0.02;

const TRACK_LIMIT: f64 = 2.4;
/// Twelve degrees, the classic pole-failure angle.
const ANGLE_LIMIT: f64 = 12.0 * std::f64::consts::PI / 180.0;

/// Single-pole cart balancing.
///
/// A pole is hinged to a cart on a bounded track; the controller reads the
/// four-dimensional state each step and pushes the cart left or right with a
/// fixed-magnitude force. The trial ends when the cart leaves the track, the
/// pole falls past twelve degrees, or the step limit is reached. Raw fitness
/// is the number of steps balanced, so the task is solved exactly when a
/// trial survives to the limit.
#[derive(Debug, Clone)]
pub struct CartPole {
    max_steps: usize,
    initial_angle: f64,
}

#[derive(Debug, Clone, Copy)]
struct State {
    x: f64,
    x_dot: f64,
    theta: f64,
    theta_dot: f64,
}

impl State {
    fn new(x: f64, theta: f64) -> Self {
        Self {
            x,
            x_dot: 0.0,
            theta,
            theta_dot: 0.0,
        }
    }

    fn failed(self) -> bool {
        self.x.abs() > TRACK_LIMIT || self.theta.abs() > ANGLE_LIMIT
    }

    /// One Euler step of the standard cart-pole dynamics.
    fn step(&mut self, force: f64) {
        let cos = self.theta.cos();
        let sin = self.theta.sin();
        let temp =
            (force + POLE_MASS_LENGTH * self.theta_dot.powi(2) * sin) / TOTAL_MASS;
        let theta_acc = (GRAVITY * sin - cos * temp)
            / (POLE_HALF_LENGTH * (4.0 / 3.0 - POLE_MASS * cos.powi(2) / TOTAL_MASS));
        let x_acc = temp - POLE_MASS_LENGTH * theta_acc * cos / TOTAL_MASS;

        self.x += TAU * self.x_dot;
        self.x_dot += TAU * x_acc;
        self.theta += TAU * self.theta_dot;
        self.theta_dot += TAU * theta_acc;
    }

    /// Sensor vector scaled into roughly `[-1, 1]`.
    fn sense(self) -> [f64; 4] {
        [
            self.x / TRACK_LIMIT,
            self.x_dot / 10.0,
            self.theta / ANGLE_LIMIT,
            self.theta_dot / 5.0,
        ]
    }
}

impl CartPole {
    /// Creates the task with the given step limit per trial.
    #[must_use]
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps,
            initial_angle: 0.07,
        }
    }

    #[must_use]
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    #[expect(clippy::cast_precision_loss)]
    fn balance(&self, net: &mut Network, mut state: State) -> f64 {
        let mut outputs = [0.0];
        for step in 0..self.max_steps {
            net.activate(&state.sense(), &mut outputs);
            let force = if outputs[0] > 0.5 { FORCE_MAG } else { -FORCE_MAG };
            state.step(force);
            if state.failed() {
                return step as f64;
            }
        }
        self.max_steps as f64
    }
}

impl Default for CartPole {
    fn default() -> Self {
        Self::new(100_000)
    }
}

impl Task for CartPole {
    fn name(&self) -> &str {
        "cart-pole"
    }

    fn input_dimension(&self) -> usize {
        4
    }

    fn output_dimension(&self) -> usize {
        1
    }

    #[expect(clippy::cast_precision_loss)]
    fn tolerance(&self) -> f64 {
        self.max_steps as f64
    }

    fn eval_net(&self, net: &mut Network) -> f64 {
        self.balance(net, State::new(0.0, self.initial_angle))
    }

    #[expect(clippy::cast_precision_loss)]
    fn solved(&self, raw_fitness: f64) -> bool {
        raw_fitness >= self.max_steps as f64
    }

    /// Balances from a grid of held-out start states and returns the number
    /// of starts survived to the step limit.
    #[expect(clippy::cast_precision_loss)]
    fn generalization_test(&self, net: &mut Network) -> f64 {
        let mut survived = 0usize;
        for &x in &[-0.8, -0.4, 0.0, 0.4, 0.8] {
            for &theta in &[-0.1, -0.05, 0.0, 0.05, 0.1] {
                net.reset_activation();
                let steps = self.balance(net, State::new(x, theta));
                if steps >= self.max_steps as f64 {
                    survived += 1;
                }
            }
        }
        survived as f64
    }
}
