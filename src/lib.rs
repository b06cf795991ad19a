// Hardware-free simulator for a small differential-drive classroom robot
//
// A remote client speaks the same newline-delimited command protocol it
// would send to the real controller; the simulator answers with
// physically plausible motor state and sensor readings against a
// configurable maze, including ramp-profile motion and wall collisions.

pub mod config;
pub mod maze;
pub mod protocol;
pub mod server;
pub mod session;
pub mod vehicle;
