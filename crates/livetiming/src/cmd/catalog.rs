use crate::cmd::{load_catalog, CatalogArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_catalog, OutputFormat};

pub fn run(args: CatalogArgs, format: OutputFormat) -> CliResult<i32> {
    let catalog = load_catalog(args.catalog.as_deref())?;
    print_catalog(&catalog, format);
    Ok(SUCCESS)
}
