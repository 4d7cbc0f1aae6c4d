// fermenter_core/src/utils/integrators.rs

use nalgebra::DVector;

/// One fixed step of an explicit ODE scheme. `func` evaluates the state
/// derivative at a given state and time.
pub trait Integrator<T> {
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T>;
}

/// Forward Euler. First order, one derivative evaluation per step. The
/// kinetics are smooth enough between sub-steps that this is the scheme
/// the estimator ships with.
#[derive(Debug, Default)]
pub struct Euler;

impl<T> Integrator<T> for Euler
where
    T: Copy
        + std::ops::Sub<Output = T>
        + std::ops::Mul<DVector<T>, Output = DVector<T>>
        + num_traits::Float,
    DVector<T>: std::ops::Add<Output = DVector<T>>,
{
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T> {
        let dt: T = tf - t0;
        x0.clone() + dt * func(x0, t0)
    }
}
