/// Category label text drawn from (or proposed for) the taxonomy.
/// Examples: `noise`, `cleanliness`, `other`
pub type Label = String;
/// Cluster identifier assigned by the pre-classifier (dense, zero-based).
pub type ClusterId = usize;
/// Keyword extracted from a cluster centroid's top-weighted terms.
pub type Keyword = String;
/// Composed prompt text sent to the oracle.
pub type PromptText = String;
/// Raw free-text response returned by the oracle.
pub type ResponseText = String;
/// Stop words removed during tokenization.
pub type StopWordSet = std::collections::HashSet<String>;
