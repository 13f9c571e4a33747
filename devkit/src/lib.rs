/*!
# tb3-devkit - test doubles for the health poller

Lets the poller run without a robot or a ROS install:
- `ScriptedSource`: telemetry source with settable readings, failures and latency
- `RecordingSink`: keeps every emitted alert and published snapshot
- `SnapshotBuilder`: healthy snapshot to tweak field by field
- `TestHarness`: wires the above into a `HealthPoller`
*/

pub mod recording_sink;
pub mod scripted_source;
pub mod snapshot_builder;
pub mod test_utils;

pub use recording_sink::RecordingSink;
pub use scripted_source::ScriptedSource;
pub use snapshot_builder::SnapshotBuilder;
pub use test_utils::{init_tracing, wait_for, wait_until, TestHarness};
