//! Human-readable descriptions for process exit codes.

/// Describe a process exit code on Windows using the standard Win32
/// status strings for the low codes.
#[cfg(windows)]
pub fn exit_code_message(exit_code: i32) -> String {
    match exit_code {
        0 => "The operation completed successfully.".to_string(),
        1 => "Incorrect function.".to_string(),
        2 => "The system cannot find the file specified.".to_string(),
        3 => "The system cannot find the path specified.".to_string(),
        4 => "The system cannot open the file.".to_string(),
        5 => "Access is denied.".to_string(),
        6 => "The handle is invalid.".to_string(),
        7 => "The storage control blocks were destroyed.".to_string(),
        8 => "Not enough storage is available to process this command.".to_string(),
        9 => "The storage control block address is invalid.".to_string(),
        10 => "The environment is incorrect.".to_string(),
        11 => "An attempt was made to load a program with an incorrect format.".to_string(),
        12 => "The access code is invalid.".to_string(),
        13 => "The data is invalid.".to_string(),
        14 => "Not enough storage is available to complete this operation.".to_string(),
        15 => "The system cannot find the drive specified.".to_string(),
        16 => "The directory cannot be removed.".to_string(),
        17 => "The system cannot move the file to a different disk drive.".to_string(),
        18 => "There are no more files.".to_string(),
        19 => "The media is write protected.".to_string(),
        20 => "The system cannot find the device specified.".to_string(),
        21 => "The device is not ready.".to_string(),
        22 => "The device does not recognize the command.".to_string(),
        23 => "Data error (cyclic redundancy check).".to_string(),
        24 => "The program issued a command but the command length is incorrect.".to_string(),
        25 => "The drive cannot locate a specific area or track on the disk.".to_string(),
        other => format!("Process was exited with code {other}"),
    }
}

/// Describe a process exit code on platforms without a status table.
#[cfg(not(windows))]
pub fn exit_code_message(exit_code: i32) -> String {
    format!("Process was exited with code {exit_code}")
}
