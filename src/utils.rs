/*!
 * Utility functions for simos
 */

/// Render permission bits as an `ls -l` style mode string
pub fn format_permissions(mode: u32, is_dir: bool) -> String {
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];

    let mut out = String::with_capacity(10);
    out.push(if is_dir { 'd' } else { '-' });
    for (bit, flag) in FLAGS {
        out.push(if mode & bit != 0 { flag } else { '-' });
    }
    out
}
