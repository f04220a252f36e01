//! Reader for Microsoft Cabinet (CAB) archives, covering the feature set
//! used by Windows SDK payloads: single-part cabinets whose folders are
//! stored or MSZIP-compressed.
//!
//! Normative references are [MS-CAB] for the container layout and [MS-MCI]
//! for MSZIP. Data-block checksums are not verified.
//!
//! [MS-CAB]: https://docs.microsoft.com/en-us/openspecs/windows_protocols/ms-cab/
//! [MS-MCI]: https://docs.microsoft.com/en-us/openspecs/windows_protocols/ms-mci/

mod cabinet;
mod consts;
mod ctype;
mod datetime;
mod exact;
mod mszip;

pub use cabinet::{Cabinet, FileContent, FileEntries, FileEntry, Header};
pub use ctype::CompressionType;
pub use exact::ExactReader;
