use crate::problem::{ElectrodeSettings, Workflow};
use crate::solve::SolverSettings;
use color_eyre::eyre::eyre;
use config::{Config, File};
use serde::{de::DeserializeOwned, Deserialize};
use std::env;
use transporter_mesher::{BoundaryConditions, BoundaryKind, MesherError, Shape};

#[derive(Debug, Deserialize)]
pub(crate) struct Configuration<T> {
    pub(crate) grid: GridConfiguration,
    pub(crate) electrodes: ElectrodeSettings<T>,
    pub(crate) solver: SolverConfiguration<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GridConfiguration {
    /// The resolution the solver works at
    pub(crate) shape: [usize; 3],
    /// The resolution of the field handed back, defaults to the working resolution
    pub(crate) output_shape: Option<[usize; 3]>,
    /// `[low, high]` pairs for each lattice direction
    #[serde(default = "periodic")]
    pub(crate) boundary: Vec<[BoundaryKind; 2]>,
}

fn periodic() -> Vec<[BoundaryKind; 2]> {
    vec![[BoundaryKind::Periodic; 2]; 3]
}

#[derive(Debug, Deserialize)]
pub(crate) struct SolverConfiguration<T> {
    #[serde(flatten)]
    pub(crate) settings: SolverSettings<T>,
    #[serde(flatten)]
    pub(crate) workflow: Workflow,
}

impl GridConfiguration {
    pub(crate) fn shape(&self) -> Result<Shape, MesherError> {
        Shape::new(self.shape)
    }

    pub(crate) fn output_shape(&self) -> Result<Option<Shape>, MesherError> {
        self.output_shape.map(Shape::new).transpose()
    }

    pub(crate) fn boundary(&self) -> Result<BoundaryConditions, MesherError> {
        BoundaryConditions::try_from_pairs(&self.boundary)
    }
}

impl<T: DeserializeOwned> Configuration<T> {
    pub(crate) fn build() -> color_eyre::Result<Self> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Defaults for every run
            .add_source(File::with_name("../.config/default"))
            // Optional overrides for the current run mode
            .add_source(File::with_name(&format!("../.config/{}", run_mode)).required(false))
            .build()?;

        s.try_deserialize()
            .map_err(|e| eyre!("Failed to deserialize the config file: {:?}", e))
    }
}

#[cfg(test)]
mod test {
    use super::Configuration;
    use crate::region::SplitPolicy;
    use crate::solve::Acceleration;
    use config::{Config, File, FileFormat};
    use transporter_mesher::{BoundaryKind, MesherError, Side};

    fn parse(source: &str) -> Configuration<f64> {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn full_configuration_is_read() {
        let configuration = parse(
            r#"
            [grid]
            shape = [20, 20, 40]
            output_shape = [10, 10, 20]
            boundary = [["periodic", "periodic"], ["dirichlet", "neumann"], ["dirichlet", "dirichlet"]]

            [electrodes]
            radius = 1.5
            split = "spatial"

            [solver]
            tolerance = 1e-8
            maximum_iterations = 500
            acceleration = "fgmres"
            restart = 12
            boundary_correction = false
            "#,
        );
        assert_eq!(configuration.grid.shape().unwrap().dims(), [20, 20, 40]);
        assert_eq!(
            configuration.grid.output_shape().unwrap().map(|s| s.dims()),
            Some([10, 10, 20])
        );
        let boundary = configuration.grid.boundary().unwrap();
        assert_eq!(boundary.kind(1, Side::High), BoundaryKind::Neumann);
        assert_eq!(configuration.electrodes.radius, 1.5);
        assert_eq!(configuration.electrodes.split, SplitPolicy::Spatial);
        let solver = &configuration.solver;
        assert_eq!(solver.settings.acceleration, Acceleration::FlexibleGmres);
        assert_eq!(solver.settings.restart, 12);
        assert!(!solver.workflow.boundary_correction);
        assert!(!solver.workflow.repin_electrodes);
        assert!(!solver.workflow.box_only);
    }

    #[test]
    fn boundary_defaults_to_periodic_and_needs_three_axes() {
        let configuration = parse(
            r#"
            [grid]
            shape = [4, 4, 4]

            [electrodes]
            radius = 1.0

            [solver]
            tolerance = 1e-6
            maximum_iterations = 100
            "#,
        );
        assert!(configuration.grid.boundary().unwrap().is_periodic(2));
        assert_eq!(configuration.grid.output_shape().unwrap(), None);
        assert_eq!(
            configuration.solver.settings.acceleration,
            Acceleration::ConjugateGradient
        );

        let configuration = parse(
            r#"
            [grid]
            shape = [4, 4, 4]
            boundary = [["periodic", "periodic"], ["neumann", "neumann"]]

            [electrodes]
            radius = 1.0

            [solver]
            tolerance = 1e-6
            maximum_iterations = 100
            "#,
        );
        assert!(matches!(
            configuration.grid.boundary(),
            Err(MesherError::BoundaryArity(2))
        ));
    }
}
