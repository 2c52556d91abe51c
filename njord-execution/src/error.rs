#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("bus error: {0}")]
    Bus(String),

    #[error("journal error: {0}")]
    Journal(String),

    #[error("planner requires at least one slice")]
    EmptyPlan,

    #[error("volume profile must cover at least one bucket")]
    EmptyVolumeProfile,

    #[error("quantity conservation law violated: filled+planned={actual}, total={total}, tol={tol}")]
    ConservationViolated {
        actual: rust_decimal::Decimal,
        total: rust_decimal::Decimal,
        tol: rust_decimal::Decimal,
    },
}
