mod cfg;
mod util;
