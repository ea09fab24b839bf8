mod control_loop;
mod drive_properties;
mod safety_watchdog;
mod servo_continuity;
