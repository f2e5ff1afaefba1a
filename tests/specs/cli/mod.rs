mod batch;
mod help;
mod queues;
mod run;
