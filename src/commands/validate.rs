use crate::cli::ValidateArgs;
use crate::exit_codes;
use crate::output;
use ecg_link::DeviceAddress;
use serde::Serialize;

#[derive(Serialize)]
struct ValidateOutput {
    address: String,
    valid: bool,
    normalized: Option<String>,
    url: Option<String>,
    error: Option<String>,
}

pub fn execute(args: ValidateArgs) -> i32 {
    let parsed = DeviceAddress::parse(&args.address);

    let result = ValidateOutput {
        address: args.address.clone(),
        valid: parsed.is_ok(),
        normalized: parsed.as_ref().ok().map(|a| a.to_string()),
        url: parsed.as_ref().ok().map(|a| a.url()),
        error: parsed.as_ref().err().map(|e| e.to_string()),
    };

    if args.json {
        if let Err(e) = output::emit(&result, false, None) {
            eprintln!("Error: {:#}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        match &parsed {
            Ok(address) => println!("'{}' is valid ({})", args.address, address.url()),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    if result.valid {
        exit_codes::SUCCESS
    } else {
        exit_codes::INVALID_INPUT
    }
}
