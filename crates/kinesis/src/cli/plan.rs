use anyhow::{Context, Result};
use clap::Args;
use kinesis_core::kinematics::{MotionParameters, planner};

#[derive(Args)]
pub struct PlanArgs {
    /// Distance to cover.
    #[arg(long)]
    pub distance: f64,

    /// Speed at the start of the move.
    #[arg(long, default_value_t = 0.0)]
    pub initial_speed: f64,

    #[arg(long)]
    pub duration: Option<f64>,

    #[arg(long)]
    pub max_speed: Option<f64>,

    /// Positive acceleration rate.
    #[arg(long, requires = "deceleration", allow_negative_numbers = true)]
    pub acceleration: Option<f64>,

    /// Negative deceleration rate.
    #[arg(long, requires = "acceleration", allow_negative_numbers = true)]
    pub deceleration: Option<f64>,

    /// Print the phases as JSON.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub fn run(&self) -> Result<()> {
        let parameters = MotionParameters {
            duration: self.duration,
            max_speed: self.max_speed,
            acceleration: self.acceleration,
            deceleration: self.deceleration,
        };
        let phases = planner::plan(self.distance, self.initial_speed, &parameters)
            .context("no profile satisfies the given parameters")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&phases)?);
            return Ok(());
        }

        println!(
            "accelerate {:>10.4}s  {:.4} -> {:.4}",
            phases.accel_duration, phases.initial_speed, phases.cruise_speed
        );
        println!(
            "cruise     {:>10.4}s  {:.4}",
            phases.cruise_duration, phases.cruise_speed
        );
        println!(
            "decelerate {:>10.4}s  {:.4} -> {:.4}",
            phases.decel_duration, phases.cruise_speed, phases.end_speed
        );
        println!(
            "total      {:>10.4}s  over {:.4}",
            phases.total_duration(),
            phases.distance()
        );
        Ok(())
    }
}
