/// Dense user identifier in `[0, user_count)`.
pub type UserId = u32;
/// Dense item identifier in `[0, item_count)`.
pub type ItemId = u32;
/// Name of a per-user interaction split inside a snapshot.
/// Examples: `train`, `vad_tr`, `test_tr`, `test_te`
pub type SplitName = String;
/// Name of a popularity-bucket threshold carried through from preprocessing.
/// Examples: `low`, `high`
pub type ThresholdName = String;
/// One `(user, positive item, negative item)` row.
pub type Triple = [u32; 3];
