//! Text layouts written next to each page: the box layout (`.py.box`) and
//! the ellipse label layout (`.py.ell`).

mod boxfmt;
mod diff;
mod ellipse;

pub use boxfmt::{box_coordinates, export_box, import_box};
pub use diff::{ChangeCheck, ChangeDetail, check_change, line_diff};
pub use ellipse::{
    FIELD_SEPARATOR, RECORD_SEPARATOR, export_ellipse, import_ellipse, parse_ellipse,
};
