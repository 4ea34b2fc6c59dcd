mod commit;
mod event;
mod query;
mod skeleton;
mod snapshot;

pub use commit::{CommitOptions, CommitResult};
pub use event::{Command, EntityMeta, Event, EventKind};
pub use query::{
    DiffQuery, EdgeDirection, EventGroup, GroupBy, KspOptions, LogQuery, LogResult, NodeDiff,
    Path, ShowGroup, ShowQuery, ShowResult, SortOrder, TraverseOptions, TraversalResult,
    UniqueEdges, UniqueVertices, WeightedPath,
};
pub use skeleton::{LogicalEnd, SkeletonKind, ValidityInterval};
pub use snapshot::Snapshot;
