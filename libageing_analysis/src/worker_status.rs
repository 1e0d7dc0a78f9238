use std::fmt::Display;

/// The pipeline stage a worker is currently in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Extracting,
    Fitting,
    Aggregating,
    Ageing,
    Normalizing,
    Done,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extracting => write!(f, "Extracting traces"),
            Self::Fitting => write!(f, "Fitting distributions"),
            Self::Aggregating => write!(f, "Averaging reference channels"),
            Self::Ageing => write!(f, "Calculating ageing factors"),
            Self::Normalizing => write!(f, "Normalizing"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// Progress report sent from a pipeline worker to whoever is watching (UI or CLI)
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub dataset: String,
    pub stage: Stage,
}

impl WorkerStatus {
    pub fn new(progress: f32, dataset: &str, stage: Stage) -> Self {
        Self {
            progress,
            dataset: dataset.to_string(),
            stage,
        }
    }
}
