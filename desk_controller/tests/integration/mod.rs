mod brake_sequencing;
mod desk;
mod emergency_stop;
mod scenarios;
