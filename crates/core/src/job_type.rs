use serde::{Deserialize, Serialize};

/// Static description of a job type: how hard it is throttled and how many
/// of its jobs may run at once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JobTypeSpec {
    pub id: u8,
    /// Multiplier applied to elapsed execution time when advancing the
    /// type's virtual runtime. Higher weight throttles the type harder.
    pub weight: f64,
    /// Maximum number of jobs of this type in flight at the same time.
    pub max_parallel: usize,
}

const FOREGROUND: JobTypeSpec = JobTypeSpec { id: 1, weight: 1.0, max_parallel: 6 };
const BACKGROUND: JobTypeSpec = JobTypeSpec { id: 2, weight: 1.6, max_parallel: 6 };
const BACKGROUND_IO: JobTypeSpec = JobTypeSpec { id: 3, weight: 2.0, max_parallel: 4 };
const IMMEDIATE: JobTypeSpec = JobTypeSpec { id: 4, weight: 1.0, max_parallel: 1 };

/// The fixed catalog of job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Work the user is waiting on.
    Foreground,
    /// General background work.
    #[default]
    Background,
    /// Background work dominated by disk or network I/O.
    BackgroundIo,
    /// Bypasses fair scheduling and runs as soon as a pool slot is free.
    Immediate,
}

impl JobType {
    pub const ALL: [JobType; 4] = [
        JobType::Foreground,
        JobType::Background,
        JobType::BackgroundIo,
        JobType::Immediate,
    ];

    pub fn spec(self) -> &'static JobTypeSpec {
        match self {
            JobType::Foreground => &FOREGROUND,
            JobType::Background => &BACKGROUND,
            JobType::BackgroundIo => &BACKGROUND_IO,
            JobType::Immediate => &IMMEDIATE,
        }
    }

    pub fn id(self) -> u8 {
        self.spec().id
    }

    pub fn weight(self) -> f64 {
        self.spec().weight
    }

    pub fn max_parallel(self) -> usize {
        self.spec().max_parallel
    }

    pub fn is_immediate(self) -> bool {
        self == JobType::Immediate
    }

    /// Look a type up by its numeric id.
    pub fn from_id(id: u8) -> Option<JobType> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::Foreground => write!(f, "foreground"),
            JobType::Background => write!(f, "background"),
            JobType::BackgroundIo => write!(f, "background_io"),
            JobType::Immediate => write!(f, "immediate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_values() {
        assert_eq!(JobType::Foreground.weight(), 1.0);
        assert_eq!(JobType::Background.weight(), 1.6);
        assert_eq!(JobType::BackgroundIo.weight(), 2.0);
        assert_eq!(JobType::Background.max_parallel(), 6);
        assert_eq!(JobType::BackgroundIo.max_parallel(), 4);
        assert_eq!(JobType::Immediate.max_parallel(), 1);
    }

    #[test]
    fn ids_are_unique_and_round_trip() {
        for t in JobType::ALL {
            assert_eq!(JobType::from_id(t.id()), Some(t));
        }
        assert_eq!(JobType::from_id(0), None);
        assert_eq!(JobType::from_id(9), None);
    }

    #[test]
    fn only_immediate_is_immediate() {
        let immediate: Vec<_> = JobType::ALL.into_iter().filter(|t| t.is_immediate()).collect();
        assert_eq!(immediate, vec![JobType::Immediate]);
    }

    #[test]
    fn default_is_background() {
        assert_eq!(JobType::default(), JobType::Background);
    }

    #[test]
    fn display_names() {
        assert_eq!(JobType::BackgroundIo.to_string(), "background_io");
        assert_eq!(JobType::Foreground.to_string(), "foreground");
    }
}
