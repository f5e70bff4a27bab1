pub mod intake;
pub mod leaderboard;
pub mod prediction_scorer;
pub mod quota_calculator;
pub mod settlement;

pub use intake::*;
pub use leaderboard::*;
pub use prediction_scorer::*;
pub use quota_calculator::*;
pub use settlement::*;
