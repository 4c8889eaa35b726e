pub mod components;
pub mod error;
pub mod find_union;
pub mod fragment_model;
pub mod indexer;
pub mod multireads;
pub mod reads;
pub mod reference;
pub mod sampler;
pub mod summary;
pub mod weight_builder;
pub mod weight_matrix;
pub mod worker_pool;
#[macro_use]
extern crate log;

pub use error::{QuantError, Result};
pub use fragment_model::{EmpiricalFragmentModel, FragmentModel, GaussianFragmentModel, PositionalBias};
pub use reads::ReadClasses;
pub use reference::{ReferenceSequences, ReferenceTable};
pub use sampler::{Sampler, SamplerConfig};
pub use summary::{Estimate, PosteriorSummary};
pub use weight_builder::{FragmentWeights, WeightBuilder};
pub use worker_pool::WorkerPool;
