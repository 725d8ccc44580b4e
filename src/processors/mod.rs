pub mod key_builder;
pub mod metadata_joiner;
pub mod pivot_aggregator;
pub mod single_phase;
pub mod time_window_joiner;
pub mod two_phase;

pub use key_builder::{hour_prefix, DataRow, KeyBuilder};
pub use metadata_joiner::{MatchStrategy, MetadataBroadcastJoiner};
pub use pivot_aggregator::{PivotAggregator, PivotReducer};
pub use single_phase::SinglePhasePipeline;
pub use time_window_joiner::{cross_join, MalformedLinePolicy, TimeJoinInput, TimeWindowJoiner};
pub use two_phase::{Phase1Summary, TwoPhasePipeline};
