mod bar;
mod features;
mod order;
mod order_state;
mod position;
mod regime;
mod side;
mod signal;

pub use bar::{MarketBar, MarketEvent};
pub use features::FeatureVector;
pub use order::{InvalidTransition, Order, OrderTransition};
pub use order_state::OrderState;
pub use position::{CloseReason, Position, PositionStatus};
pub use regime::{RegimeLabel, RegimeState};
pub use side::Side;
pub use signal::{Direction, Signal};
