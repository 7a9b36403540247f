mod http;

pub(crate) use http::HttpCaller;
