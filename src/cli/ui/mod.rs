mod device_view;
mod painter;
mod session_view;
mod spinner;
mod table;

pub(crate) use self::device_view::DeviceListView;
pub(crate) use self::painter::Painter;
pub(crate) use self::session_view::{ServiceListView, StatusView};
pub(crate) use self::spinner::{Spinner, SpinnerHandle};
