use livetiming::credentials::CredentialStore;

use crate::cmd::LogoutArgs;
use crate::exit::{io_error, CliResult, SUCCESS};

pub fn run(args: LogoutArgs) -> CliResult<i32> {
    let store = CredentialStore::new(&args.credentials);
    let removed = store
        .remove()
        .map_err(|err| io_error(&format!("credentials {}", store.path().display()), err))?;
    if removed {
        println!("removed {}", store.path().display());
    } else {
        println!("no stored credentials at {}", store.path().display());
    }
    Ok(SUCCESS)
}
